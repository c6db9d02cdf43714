//! In-memory consolidated store fixtures.
//!
//! `StoreFixture` builds the object set a Zarr v2 writer would produce:
//! metadata documents, encoded chunk objects and the `.zmetadata`
//! document tying them together.
//!
//! ```ignore
//! use test_utils::StoreFixture;
//! use zarr_codec::{ArrayData, ArrayMetadata};
//!
//! let fixture = StoreFixture::new()
//!     .group("units")
//!     .attrs("units", serde_json::json!({"count": 3}))
//!     .array("units/ids", ArrayMetadata::new(vec![3], vec![2], "<i4"), &ArrayData::Int32(vec![1, 2, 3]));
//! let objects = fixture.objects();
//! ```

use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use zarr_codec::{strides, ArrayData, ArrayMetadata, ChunkCodec};

/// Name of the file packed chunks are written to.
pub const PACKED_FILE: &str = "_consolidated_0.dat";

/// Key of the consolidated metadata document.
pub const ZMETADATA: &str = ".zmetadata";

/// Builder for a consolidated store held in memory.
#[derive(Debug, Clone)]
pub struct StoreFixture {
    metadata: Map<String, Value>,
    chunks: BTreeMap<String, Vec<u8>>,
    extra: BTreeMap<String, Vec<u8>>,
    packed: bool,
    trim_edges: bool,
}

impl Default for StoreFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn key(path: &str, suffix: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        suffix.to_string()
    } else {
        format!("{path}/{suffix}")
    }
}

fn grid(shape: &[u64]) -> Vec<Vec<u64>> {
    let mut out: Vec<Vec<u64>> = vec![Vec::new()];
    for &n in shape {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..n).map(move |i| {
                    let mut coords = prefix.clone();
                    coords.push(i);
                    coords
                })
            })
            .collect();
    }
    out
}

impl StoreFixture {
    /// A store with a root group and nothing else.
    pub fn new() -> Self {
        let mut metadata = Map::new();
        metadata.insert(".zgroup".to_string(), json!({"zarr_format": 2}));
        Self {
            metadata,
            chunks: BTreeMap::new(),
            extra: BTreeMap::new(),
            packed: false,
            trim_edges: false,
        }
    }

    /// Add a group at `path`.
    pub fn group(mut self, path: &str) -> Self {
        self.metadata
            .insert(key(path, ".zgroup"), json!({"zarr_format": 2}));
        self
    }

    /// Set the attributes of the node at `path`.
    pub fn attrs(mut self, path: &str, attrs: Value) -> Self {
        self.metadata.insert(key(path, ".zattrs"), attrs);
        self
    }

    /// Add an array and no chunk objects.
    pub fn empty_array(mut self, path: &str, meta: ArrayMetadata) -> Self {
        let value = serde_json::to_value(&meta)
            .unwrap_or_else(|e| panic!("fixture array {path}: {e}"));
        self.metadata.insert(key(path, ".zarray"), value);
        self
    }

    /// Add an array and encode `data` (row-major over the whole shape)
    /// into one object per chunk.
    pub fn array(mut self, path: &str, meta: ArrayMetadata, data: &ArrayData) -> Self {
        let codec = ChunkCodec::from_metadata(&meta)
            .unwrap_or_else(|e| panic!("fixture array {path}: {e}"));
        let array_strides = strides(&meta.shape, zarr_codec::MemoryOrder::RowMajor);

        for coords in grid(&meta.chunk_grid_shape()) {
            let local_shape = if self.trim_edges {
                meta.chunk_extent(&coords)
            } else {
                meta.chunks.clone()
            };
            let local_strides = strides(&local_shape, meta.order);
            let len = local_shape.iter().product::<u64>() as usize;

            let indices: Vec<Option<usize>> = (0..len)
                .map(|p| {
                    let mut flat = 0usize;
                    for d in 0..local_shape.len() {
                        let local = (p / local_strides[d]) as u64 % local_shape[d];
                        let global = coords[d] * meta.chunks[d] + local;
                        if global >= meta.shape[d] {
                            return None;
                        }
                        flat += global as usize * array_strides[d];
                    }
                    Some(flat)
                })
                .collect();

            let chunk = data
                .gather(&indices, codec.fill_value())
                .and_then(|chunk| codec.encode(&chunk))
                .unwrap_or_else(|e| panic!("fixture chunk {coords:?} of {path}: {e}"));
            self.chunks
                .insert(key(path, &meta.chunk_key(&coords)), chunk);
        }
        self.empty_array(path, meta)
    }

    /// Write edge chunks at their trimmed extent instead of padding them.
    /// Applies to arrays added after this call.
    pub fn trim_edge_chunks(mut self) -> Self {
        self.trim_edges = true;
        self
    }

    /// Drop one chunk object so reads fall back to the fill value.
    pub fn without_chunk(mut self, array_path: &str, chunk_key: &str) -> Self {
        self.chunks.remove(&key(array_path, chunk_key));
        self
    }

    /// Add an arbitrary object.
    pub fn object(mut self, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.extra.insert(key.to_string(), bytes.into());
        self
    }

    /// Pack every chunk into one file addressed through `refs`.
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    /// Keys of every chunk object, in key order.
    pub fn chunk_keys(&self) -> Vec<String> {
        self.chunks.keys().cloned().collect()
    }

    /// Encoded bytes of one chunk object.
    pub fn chunk(&self, key: &str) -> Option<&[u8]> {
        self.chunks.get(key).map(Vec::as_slice)
    }

    /// The `.zmetadata` document.
    pub fn zmetadata(&self) -> Value {
        let mut doc = json!({
            "zarr_consolidated_format": 1,
            "metadata": Value::Object(self.metadata.clone()),
        });
        if self.packed {
            let mut refs = Map::new();
            let mut offset = 0u64;
            for (key, bytes) in &self.chunks {
                refs.insert(key.clone(), json!([PACKED_FILE, offset, bytes.len()]));
                offset += bytes.len() as u64;
            }
            doc["refs"] = Value::Object(refs);
        }
        doc
    }

    /// Every object of the store, `.zmetadata` included.
    pub fn objects(&self) -> Vec<(String, Bytes)> {
        let mut out = vec![(ZMETADATA.to_string(), Bytes::from(self.zmetadata().to_string()))];
        if self.packed {
            let packed: Vec<u8> = self.chunks.values().flatten().copied().collect();
            out.push((PACKED_FILE.to_string(), Bytes::from(packed)));
        } else {
            out.extend(
                self.chunks
                    .iter()
                    .map(|(k, v)| (k.clone(), Bytes::from(v.clone()))),
            );
        }
        out.extend(
            self.extra
                .iter()
                .map(|(k, v)| (k.clone(), Bytes::from(v.clone()))),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zarr_codec::MemoryOrder;

    #[test]
    fn test_chunk_objects_are_padded() {
        let fixture = StoreFixture::new().array(
            "x",
            ArrayMetadata::new(vec![3], vec![2], "<u1"),
            &ArrayData::UInt8(vec![1, 2, 3]),
        );
        assert_eq!(fixture.chunk_keys(), vec!["x/0", "x/1"]);
        assert_eq!(fixture.chunk("x/1"), Some(&[3u8, 0][..]));
    }

    #[test]
    fn test_trimmed_edges() {
        let fixture = StoreFixture::new().trim_edge_chunks().array(
            "x",
            ArrayMetadata::new(vec![3], vec![2], "<u1"),
            &ArrayData::UInt8(vec![1, 2, 3]),
        );
        assert_eq!(fixture.chunk("x/1"), Some(&[3u8][..]));
    }

    #[test]
    fn test_column_major_chunk_layout() {
        let fixture = StoreFixture::new().array(
            "m",
            ArrayMetadata::new(vec![2, 2], vec![2, 2], "|u1").with_order(MemoryOrder::ColumnMajor),
            &ArrayData::UInt8(vec![1, 2, 3, 4]),
        );
        assert_eq!(fixture.chunk("m/0.0"), Some(&[1u8, 3, 2, 4][..]));
    }

    #[test]
    fn test_packed_refs() {
        let fixture = StoreFixture::new()
            .array(
                "x",
                ArrayMetadata::new(vec![4], vec![2], "<u1"),
                &ArrayData::UInt8(vec![1, 2, 3, 4]),
            )
            .packed();
        let doc = fixture.zmetadata();
        assert_eq!(doc["refs"]["x/1"], json!([PACKED_FILE, 2, 2]));

        let objects = fixture.objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].1.as_ref(), &[1, 2, 3, 4]);
    }
}
