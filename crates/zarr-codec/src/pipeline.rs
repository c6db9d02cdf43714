//! Full chunk codec: compressor, then filters in reverse, then typed view.

use tracing::trace;

use crate::compressor::Compressor;
use crate::data::ArrayData;
use crate::dtype::DataType;
use crate::error::{CodecError, Result};
use crate::filter::Filter;
use crate::metadata::{ArrayMetadata, FillValue, MemoryOrder};

/// A decoded chunk and the extent its buffer is laid out in.
///
/// `shape` is either the full chunk shape or, for a writer that stored
/// trimmed edge chunks, the trimmed extent.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    pub data: ArrayData,
    pub shape: Vec<u64>,
    pub order: MemoryOrder,
}

impl DecodedChunk {
    /// Element strides of the buffer, per dimension.
    pub fn strides(&self) -> Vec<usize> {
        strides(&self.shape, self.order)
    }
}

/// Element strides for a buffer of `shape` laid out in `order`.
pub fn strides(shape: &[u64], order: MemoryOrder) -> Vec<usize> {
    let n = shape.len();
    let mut out = vec![1usize; n];
    match order {
        MemoryOrder::RowMajor => {
            for d in (0..n.saturating_sub(1)).rev() {
                out[d] = out[d + 1] * shape[d + 1] as usize;
            }
        }
        MemoryOrder::ColumnMajor => {
            for d in 1..n {
                out[d] = out[d - 1] * shape[d - 1] as usize;
            }
        }
    }
    out
}

/// Encode/decode pipeline derived from one array's metadata.
#[derive(Debug, Clone)]
pub struct ChunkCodec {
    metadata: ArrayMetadata,
    dtype: DataType,
    fill: FillValue,
    compressor: Option<Compressor>,
    filters: Vec<Filter>,
}

impl ChunkCodec {
    /// Resolve dtype, fill value, compressor and filters.
    ///
    /// Any unsupported entry fails here, before chunk bytes are touched.
    pub fn from_metadata(metadata: &ArrayMetadata) -> Result<Self> {
        metadata.validate()?;
        let dtype = metadata.data_type()?;
        let fill = FillValue::from_json(&metadata.fill_value, &dtype)?;
        let compressor = metadata
            .compressor
            .as_ref()
            .map(|spec| Compressor::from_spec(spec, dtype.size()))
            .transpose()?;
        let filters = metadata
            .filters
            .iter()
            .flatten()
            .map(|spec| Filter::from_spec(spec, &dtype))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            metadata: metadata.clone(),
            dtype,
            fill,
            compressor,
            filters,
        })
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn fill_value(&self) -> FillValue {
        self.fill
    }

    pub fn compressor(&self) -> Option<&Compressor> {
        self.compressor.as_ref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Undo compression and filters, returning raw element bytes.
    pub fn decode_bytes(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let mut bytes = match &self.compressor {
            Some(c) => c.decode(encoded)?,
            None => encoded.to_vec(),
        };
        for filter in self.filters.iter().rev() {
            bytes = filter.decode(&bytes)?;
        }
        Ok(bytes)
    }

    /// Apply filters in declared order, then the compressor.
    pub fn encode(&self, data: &ArrayData) -> Result<Vec<u8>> {
        let mut bytes = data.to_bytes(self.dtype.byte_order());
        for filter in &self.filters {
            bytes = filter.encode(&bytes)?;
        }
        match &self.compressor {
            Some(c) => c.encode(&bytes),
            None => Ok(bytes),
        }
    }

    /// Decode the stored object of chunk `coords`.
    ///
    /// The element count must equal either the full chunk or the chunk
    /// trimmed at the array boundary.
    pub fn decode_chunk(&self, coords: &[u64], encoded: &[u8]) -> Result<DecodedChunk> {
        let bytes = self.decode_bytes(encoded)?;
        let item = self.dtype.size();
        let full = self.metadata.chunks.clone();
        let trimmed = self.metadata.chunk_extent(coords);
        let full_len = self.metadata.chunk_len();
        let trimmed_len = trimmed.iter().product::<u64>() as usize;

        let shape = if bytes.len() == full_len * item {
            full
        } else if bytes.len() == trimmed_len * item {
            trimmed
        } else {
            return Err(CodecError::LengthMismatch {
                expected: vec![full_len * item, trimmed_len * item],
                actual: bytes.len(),
            });
        };

        trace!(
            chunk = ?coords,
            encoded_bytes = encoded.len(),
            decoded_bytes = bytes.len(),
            "Decoded chunk"
        );

        Ok(DecodedChunk {
            data: ArrayData::from_bytes(&bytes, &self.dtype)?,
            shape,
            order: self.metadata.order,
        })
    }

    /// A full chunk holding only the fill value, for chunks never written.
    pub fn fill_chunk(&self) -> Result<DecodedChunk> {
        Ok(DecodedChunk {
            data: ArrayData::filled(&self.dtype, self.fill, self.metadata.chunk_len())?,
            shape: self.metadata.chunks.clone(),
            order: self.metadata.order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CodecSpec;
    use serde_json::json;

    fn meta() -> ArrayMetadata {
        ArrayMetadata::new(vec![5, 3], vec![2, 2], "<i4")
            .with_compressor(CodecSpec::new("zlib").with("level", 1))
            .with_filters(vec![CodecSpec::new("shuffle").with("elementsize", 4)])
            .with_fill_value(json!(-9))
    }

    #[test]
    fn test_strides() {
        assert_eq!(strides(&[4, 3, 2], MemoryOrder::RowMajor), vec![6, 2, 1]);
        assert_eq!(strides(&[4, 3, 2], MemoryOrder::ColumnMajor), vec![1, 4, 12]);
        assert!(strides(&[], MemoryOrder::RowMajor).is_empty());
    }

    #[test]
    fn test_from_metadata_rejects_unsupported_codecs() {
        let m = meta().with_compressor(CodecSpec::new("lzma"));
        assert!(matches!(
            ChunkCodec::from_metadata(&m),
            Err(CodecError::UnsupportedCompressor(_))
        ));
        let m = meta().with_filters(vec![CodecSpec::new("categorize")]);
        assert!(matches!(
            ChunkCodec::from_metadata(&m),
            Err(CodecError::UnsupportedFilter(_))
        ));
    }

    #[test]
    fn test_decode_full_chunk() {
        let codec = ChunkCodec::from_metadata(&meta()).unwrap();
        let data = ArrayData::Int32(vec![1, 2, 3, 4]);
        let encoded = codec.encode(&data).unwrap();
        let chunk = codec.decode_chunk(&[0, 0], &encoded).unwrap();
        assert_eq!(chunk.data, data);
        assert_eq!(chunk.shape, vec![2, 2]);
    }

    #[test]
    fn test_decode_accepts_trimmed_edge_chunk() {
        let codec = ChunkCodec::from_metadata(&meta()).unwrap();
        // chunk (2, 1) covers a single element of the 5x3 array
        let encoded = codec.encode(&ArrayData::Int32(vec![42])).unwrap();
        let chunk = codec.decode_chunk(&[2, 1], &encoded).unwrap();
        assert_eq!(chunk.shape, vec![1, 1]);
        assert_eq!(chunk.data, ArrayData::Int32(vec![42]));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let codec = ChunkCodec::from_metadata(&meta()).unwrap();
        let encoded = codec.encode(&ArrayData::Int32(vec![1, 2, 3])).unwrap();
        assert!(matches!(
            codec.decode_chunk(&[0, 0], &encoded),
            Err(CodecError::LengthMismatch { actual: 12, .. })
        ));
    }

    #[test]
    fn test_fill_chunk() {
        let codec = ChunkCodec::from_metadata(&meta()).unwrap();
        let chunk = codec.fill_chunk().unwrap();
        assert_eq!(chunk.data, ArrayData::Int32(vec![-9; 4]));
    }

    #[test]
    fn test_filters_decode_in_reverse_order() {
        let m = ArrayMetadata::new(vec![4], vec![4], "<u2").with_filters(vec![
            CodecSpec::new("delta").with("dtype", "<u2"),
            CodecSpec::new("shuffle").with("elementsize", 2),
        ]);
        let codec = ChunkCodec::from_metadata(&m).unwrap();
        let data = ArrayData::UInt16(vec![100, 300, 301, 1000]);
        let encoded = codec.encode(&data).unwrap();

        let manual = Filter::Shuffle { elementsize: 2 }
            .encode(&Filter::Delta { dtype: *codec.dtype() }.encode(&data.to_bytes(codec.dtype().byte_order())).unwrap())
            .unwrap();
        assert_eq!(encoded, manual);
        assert_eq!(codec.decode_chunk(&[0], &encoded).unwrap().data, data);
    }
}
