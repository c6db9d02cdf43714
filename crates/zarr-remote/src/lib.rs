//! Remote Zarr v2 store reader
//!
//! Opens a consolidated store (one `.zmetadata` document describing every
//! group and array) behind HTTP or object storage and serves the hierarchy
//! from memory. Only chunk data goes over the network, through a cache that
//! collapses identical concurrent reads into one request.
//!
//! ```text
//! ZarrStore ── get_group / get_dataset ──► Catalog (in memory)
//!     │
//!     └── get_dataset_data ──► slice::read_slice
//!                                   │
//!                                   ▼
//!                             RemoteClient ── cache + in-flight locks
//!                                   │
//!                                   ▼
//!                             ObjectFetcher ── HTTP / object_store / memory
//!                                   │
//!                                   ▼
//!                             zarr_codec::ChunkCodec
//! ```
//!
//! # Example
//!
//! ```ignore
//! use zarr_remote::{DataOptions, StoreConfig, ZarrStore};
//!
//! let store = ZarrStore::open_url("https://data.example.org/session.zarr", StoreConfig::from_env()).await?;
//! let root = store.get_group("/").expect("root group");
//! let rows = store
//!     .get_dataset_data("/units/spike_times", &DataOptions::slice(vec![0..100]))
//!     .await?;
//! ```

pub mod attrs;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod navigator;
pub mod path;
pub mod slice;
pub mod stats;
pub mod write;

pub use attrs::{AttrValue, Attributes, NAN_SENTINEL};
pub use catalog::{Catalog, ChunkRef, GroupMetadata};
pub use client::{Payload, ReadKey, ReadOptions, RemoteClient};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use fetch::{
    ByteRange, CacheBuster, FetchRequest, HttpFetcher, MemoryFetcher, ObjectFetcher,
    ObjectStoreFetcher,
};
pub use navigator::{
    DataOptions, Dataset, Group, SubdatasetInfo, SubgroupInfo, ZarrStore, SCALAR_MARKER,
};
pub use slice::{read_slice, SlicePlan, MAX_SLICE_DIMS};
pub use stats::{StatsSnapshot, StoreStats};
pub use write::{ChannelDispatch, WriteAction, WriteDispatch};

pub use zarr_codec::{ArrayData, DatasetData, Scalar};
