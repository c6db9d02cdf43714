//! Slice assembly: chunk selection and copying overlaps into one buffer.
//!
//! ```text
//! array  [100, 4], chunks [10, 4], rows 23..47
//!
//!   chunk 2 ── rows 20..30 ── overlap 23..30 ─┐
//!   chunk 3 ── rows 30..40 ── overlap 30..40 ─┼─► output rows 0..24, row-major
//!   chunk 4 ── rows 40..50 ── overlap 40..47 ─┘
//! ```

use futures::future::try_join_all;
use std::ops::Range;
use tracing::{debug, instrument};
use zarr_codec::{ArrayData, ArrayMetadata, DecodedChunk};

use crate::client::RemoteClient;
use crate::error::{Result, StoreError};
use crate::path;

/// Most dimensions a single read may restrict.
pub const MAX_SLICE_DIMS: usize = 3;

/// Chunks and output layout of one slice read.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePlan {
    /// One range per array dimension.
    ranges: Vec<Range<u64>>,
    chunk_shape: Vec<u64>,
    chunks: Vec<Vec<u64>>,
}

impl SlicePlan {
    /// Resolve `slice` against an array. Dimensions past the end of `slice`
    /// are read in full.
    pub fn new(meta: &ArrayMetadata, slice: &[Range<u64>]) -> Result<Self> {
        if slice.len() > MAX_SLICE_DIMS {
            return Err(StoreError::protocol(format!(
                "cannot slice more than {MAX_SLICE_DIMS} dimensions at a time, got {}",
                slice.len()
            )));
        }
        if slice.len() > meta.ndim() {
            return Err(StoreError::protocol(format!(
                "slice has {} ranges but the array has {} dimensions",
                slice.len(),
                meta.ndim()
            )));
        }

        let mut ranges = Vec::with_capacity(meta.ndim());
        for (d, &extent) in meta.shape.iter().enumerate() {
            let range = match slice.get(d) {
                Some(r) if r.end < r.start => {
                    return Err(StoreError::protocol(format!(
                        "slice {}..{} of dimension {d} ends before it starts",
                        r.start, r.end
                    )))
                }
                Some(r) if r.end > extent => {
                    return Err(StoreError::protocol(format!(
                        "slice {}..{} of dimension {d} exceeds extent {extent}",
                        r.start, r.end
                    )))
                }
                Some(r) => r.clone(),
                None => 0..extent,
            };
            ranges.push(range);
        }

        let per_dim: Vec<Range<u64>> = ranges
            .iter()
            .zip(&meta.chunks)
            .map(|(r, &c)| {
                if r.start == r.end {
                    0..0
                } else {
                    r.start / c..r.end.div_ceil(c)
                }
            })
            .collect();

        Ok(Self {
            chunk_shape: meta.chunks.clone(),
            chunks: cartesian(&per_dim),
            ranges,
        })
    }

    pub fn ranges(&self) -> &[Range<u64>] {
        &self.ranges
    }

    /// Shape of the assembled output.
    pub fn out_shape(&self) -> Vec<u64> {
        self.ranges.iter().map(|r| r.end - r.start).collect()
    }

    pub fn out_len(&self) -> usize {
        self.ranges.iter().map(|r| r.end - r.start).product::<u64>() as usize
    }

    /// Coordinates of every chunk the slice touches.
    pub fn chunks(&self) -> &[Vec<u64>] {
        &self.chunks
    }

    /// Copy the part of `chunk` (at `coords`) inside the slice into `out`.
    pub fn copy_chunk_into(
        &self,
        out: &mut ArrayData,
        coords: &[u64],
        chunk: &DecodedChunk,
    ) -> zarr_codec::Result<()> {
        let n = self.ranges.len();
        if n == 0 {
            return out.copy_strided(0, &chunk.data, 0, 1, 1);
        }

        let src_strides = chunk.strides();
        let out_shape = self.out_shape();
        let dst_strides = zarr_codec::strides(&out_shape, zarr_codec::MemoryOrder::RowMajor);

        // overlap per dimension, in chunk-local and output-local offsets
        let mut src_lo = Vec::with_capacity(n);
        let mut dst_lo = Vec::with_capacity(n);
        let mut extent = Vec::with_capacity(n);
        for d in 0..n {
            let origin = coords[d] * self.chunk_shape[d];
            let lo = self.ranges[d].start.max(origin);
            let hi = self.ranges[d].end.min(origin + self.chunk_shape[d]);
            if hi <= lo {
                return Ok(());
            }
            src_lo.push((lo - origin) as usize);
            dst_lo.push((lo - self.ranges[d].start) as usize);
            extent.push((hi - lo) as usize);
        }

        let last = n - 1;
        let run = extent[last];
        let mut index = vec![0usize; last];
        loop {
            let mut src = src_lo[last] * src_strides[last];
            let mut dst = dst_lo[last] * dst_strides[last];
            for d in 0..last {
                src += (src_lo[d] + index[d]) * src_strides[d];
                dst += (dst_lo[d] + index[d]) * dst_strides[d];
            }
            out.copy_strided(dst, &chunk.data, src, src_strides[last], run)?;

            // odometer over every dimension but the last
            let mut d = last;
            loop {
                if d == 0 {
                    return Ok(());
                }
                d -= 1;
                index[d] += 1;
                if index[d] < extent[d] {
                    break;
                }
                index[d] = 0;
            }
        }
    }
}

fn cartesian(ranges: &[Range<u64>]) -> Vec<Vec<u64>> {
    let mut out: Vec<Vec<u64>> = vec![Vec::new()];
    for r in ranges {
        let mut next = Vec::with_capacity(out.len() * (r.end - r.start) as usize);
        for prefix in &out {
            for i in r.clone() {
                let mut coords = prefix.clone();
                coords.push(i);
                next.push(coords);
            }
        }
        out = next;
    }
    out
}

/// Read `slice` of the array at `array_path` into one row-major buffer.
///
/// Chunks are fetched concurrently. A chunk whose object does not exist
/// contributes the fill value.
#[instrument(skip(client, slice), fields(slice = ?slice))]
pub async fn read_slice(
    client: &RemoteClient,
    array_path: &str,
    slice: &[Range<u64>],
    cache_bust: bool,
) -> Result<(ArrayData, Vec<u64>)> {
    let array_path = path::normalize(array_path);
    let meta = client.catalog().array(array_path).ok_or_else(|| {
        StoreError::protocol(format!("no array at {}", path::display(array_path)))
    })?;
    let plan = SlicePlan::new(meta, slice)?;

    let first = plan.chunks().first().map(Vec::as_slice).unwrap_or_default();
    let codec = client.codec(array_path, first).await?;
    let mut out = ArrayData::filled(codec.dtype(), codec.fill_value(), plan.out_len())
        .map_err(|e| StoreError::decode(path::display(array_path), first, e))?;

    let chunks = try_join_all(
        plan.chunks()
            .iter()
            .map(|coords| client.read_chunk(array_path, coords, cache_bust)),
    )
    .await?;

    let mut missing = 0usize;
    for (coords, chunk) in plan.chunks().iter().zip(chunks) {
        match chunk {
            Some(chunk) => plan
                .copy_chunk_into(&mut out, coords, &chunk)
                .map_err(|e| StoreError::decode(path::display(array_path), coords, e))?,
            None => missing += 1,
        }
    }

    debug!(
        array = %path::display(array_path),
        chunks = plan.chunks().len(),
        missing_chunks = missing,
        elements = plan.out_len(),
        "Assembled slice"
    );
    Ok((out, plan.out_shape()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zarr_codec::{ArrayMetadata, MemoryOrder};

    fn meta() -> ArrayMetadata {
        ArrayMetadata::new(vec![100, 4], vec![10, 4], "<i4")
    }

    #[test]
    fn test_plan_rows() {
        let plan = SlicePlan::new(&meta(), &[23..47]).unwrap();
        assert_eq!(plan.out_shape(), vec![24, 4]);
        assert_eq!(plan.out_len(), 96);
        assert_eq!(plan.chunks(), &[vec![2u64, 0], vec![3, 0], vec![4, 0]]);
    }

    #[test]
    fn test_plan_validation() {
        let m = ArrayMetadata::new(vec![4, 4, 4, 4], vec![2, 2, 2, 2], "<f4");
        assert!(matches!(
            SlicePlan::new(&m, &[0..1, 0..1, 0..1, 0..1]),
            Err(StoreError::Protocol(_))
        ));
        assert!(SlicePlan::new(&m, &[0..1, 0..1, 0..1]).is_ok());
        assert!(SlicePlan::new(&meta(), &[0..1, 0..1, 0..1]).is_err());
        assert!(SlicePlan::new(&meta(), &[5..3]).is_err());
        assert!(SlicePlan::new(&meta(), &[0..101]).is_err());
    }

    #[test]
    fn test_empty_slice_touches_no_chunks() {
        let plan = SlicePlan::new(&meta(), &[5..5]).unwrap();
        assert!(plan.chunks().is_empty());
        assert_eq!(plan.out_shape(), vec![0, 4]);
    }

    #[test]
    fn test_copy_partial_overlap() {
        // 4x4 array, 3x3 chunks; take rows 1..4, cols 2..4 from chunk (0, 0)
        let m = ArrayMetadata::new(vec![4, 4], vec![3, 3], "<i4");
        let plan = SlicePlan::new(&m, &[1..4, 2..4]).unwrap();
        let chunk = DecodedChunk {
            data: ArrayData::Int32((0..9).collect()),
            shape: vec![3, 3],
            order: MemoryOrder::RowMajor,
        };
        let mut out = ArrayData::Int32(vec![-1; plan.out_len()]);
        plan.copy_chunk_into(&mut out, &[0, 0], &chunk).unwrap();
        // chunk rows 1..3, col 2 → out rows 0..2, col 0
        assert_eq!(out, ArrayData::Int32(vec![5, -1, 8, -1, -1, -1]));
    }

    #[test]
    fn test_copy_column_major_chunk() {
        let m = ArrayMetadata::new(vec![2, 3], vec![2, 3], "<i4").with_order(MemoryOrder::ColumnMajor);
        let plan = SlicePlan::new(&m, &[]).unwrap();
        // logical [[0, 1, 2], [3, 4, 5]] stored column-major
        let chunk = DecodedChunk {
            data: ArrayData::Int32(vec![0, 3, 1, 4, 2, 5]),
            shape: vec![2, 3],
            order: MemoryOrder::ColumnMajor,
        };
        let mut out = ArrayData::Int32(vec![0; 6]);
        plan.copy_chunk_into(&mut out, &[0, 0], &chunk).unwrap();
        assert_eq!(out, ArrayData::Int32(vec![0, 1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_zero_dimensional() {
        let m = ArrayMetadata::new(vec![], vec![], "<f8");
        let plan = SlicePlan::new(&m, &[]).unwrap();
        assert_eq!(plan.chunks(), &[Vec::<u64>::new()]);
        let chunk = DecodedChunk {
            data: ArrayData::Float64(vec![2.5]),
            shape: vec![],
            order: MemoryOrder::RowMajor,
        };
        let mut out = ArrayData::Float64(vec![0.0]);
        plan.copy_chunk_into(&mut out, &[], &chunk).unwrap();
        assert_eq!(out, ArrayData::Float64(vec![2.5]));
    }
}
