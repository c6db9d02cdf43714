//! Zarr v2 chunk codec
//!
//! Turns the bytes of one stored chunk object into a typed element buffer,
//! driven entirely by the array's `.zarray` descriptor:
//!
//! ```text
//! stored object
//!      │
//!      ├─► compressor (blosc / zlib / gzip / zstd / none)
//!      │
//!      ├─► filters, last declared first (shuffle / delta)
//!      │
//!      └─► dtype view (<f4, >i2, |u1, ...)
//!               │
//!               ▼
//!          DecodedChunk { data, shape, order }
//! ```
//!
//! The reverse direction (`ChunkCodec::encode`) is provided for writers and
//! test fixtures.
//!
//! # Example
//!
//! ```ignore
//! use zarr_codec::{ArrayMetadata, ChunkCodec};
//!
//! let meta: ArrayMetadata = serde_json::from_slice(zarray_bytes)?;
//! let codec = ChunkCodec::from_metadata(&meta)?;
//! let chunk = codec.decode_chunk(&[0, 0], &object_bytes)?;
//! ```

pub mod blosc;
pub mod compressor;
pub mod data;
pub mod dtype;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod pipeline;

pub use blosc::{BloscCompressor, BloscConfig, BloscShuffle};
pub use compressor::Compressor;
pub use data::{ArrayData, DatasetData, Scalar};
pub use dtype::{ByteOrder, DataType, ElementKind};
pub use error::{CodecError, Result};
pub use filter::Filter;
pub use metadata::{ArrayMetadata, CodecSpec, FillValue, MemoryOrder};
pub use pipeline::{strides, ChunkCodec, DecodedChunk};
