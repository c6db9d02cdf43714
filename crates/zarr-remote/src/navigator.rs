//! Hierarchy navigation over an opened store.
//!
//! Groups and datasets are cheap views recomputed from the catalog on every
//! call; only dataset data touches the network.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use zarr_codec::DatasetData;

use crate::attrs::Attributes;
use crate::catalog::Catalog;
use crate::client::RemoteClient;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::fetch::{HttpFetcher, ObjectFetcher};
use crate::path;
use crate::slice::{read_slice, MAX_SLICE_DIMS};
use crate::stats::{StatsSnapshot, StoreStats};
use crate::write::{WriteAction, WriteDispatch};

/// Attribute marking a one-element dataset that stands for a bare scalar.
pub const SCALAR_MARKER: &str = "_SCALAR";

/// Options of a dataset data read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataOptions {
    /// Half-open range per leading dimension; missing dimensions are read in full.
    pub slice: Vec<Range<u64>>,
    pub cache_bust: bool,
}

impl DataOptions {
    /// Read the whole dataset.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn slice(slice: Vec<Range<u64>>) -> Self {
        Self {
            slice,
            cache_bust: false,
        }
    }

    pub fn with_cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }
}

/// Summary of a child group.
#[derive(Debug, Clone, PartialEq)]
pub struct SubgroupInfo {
    pub name: String,
    pub path: String,
    pub attrs: Attributes,
}

/// Summary of a child dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SubdatasetInfo {
    pub name: String,
    pub path: String,
    pub shape: Vec<u64>,
    pub dtype: String,
    pub attrs: Attributes,
}

/// An opened consolidated store.
pub struct ZarrStore {
    client: RemoteClient,
    stats: Arc<StoreStats>,
    writer: Option<Arc<dyn WriteDispatch>>,
    location: String,
}

impl fmt::Debug for ZarrStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZarrStore")
            .field("location", &self.location)
            .field("entries", &self.client.catalog().len())
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

impl ZarrStore {
    /// Open a store by loading its consolidated metadata through `fetcher`.
    pub async fn open(fetcher: Arc<dyn ObjectFetcher>, config: StoreConfig) -> Result<Self> {
        Self::open_inner(fetcher, config, None).await
    }

    /// Open a store whose attribute writes go to `writer`.
    pub async fn open_with_writer(
        fetcher: Arc<dyn ObjectFetcher>,
        config: StoreConfig,
        writer: Arc<dyn WriteDispatch>,
    ) -> Result<Self> {
        Self::open_inner(fetcher, config, Some(writer)).await
    }

    /// Open a store served over HTTP at `url`.
    pub async fn open_url(url: &str, config: StoreConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(url, &config)?);
        Self::open(fetcher, config).await
    }

    #[instrument(skip_all)]
    async fn open_inner(
        fetcher: Arc<dyn ObjectFetcher>,
        config: StoreConfig,
        writer: Option<Arc<dyn WriteDispatch>>,
    ) -> Result<Self> {
        config.validate().map_err(StoreError::Config)?;
        let catalog = Catalog::create(fetcher.as_ref(), &config).await?;
        let location = fetcher.describe("");
        let stats = Arc::new(StoreStats::new());
        let client = RemoteClient::new(fetcher, Arc::new(catalog), config, Arc::clone(&stats));

        Ok(Self {
            client,
            stats,
            writer,
            location,
        })
    }

    /// Backend location of the store root.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    pub fn catalog(&self) -> &Catalog {
        self.client.catalog()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Group at `path`, or `None` if there is no `.zgroup` there.
    pub fn get_group(&self, path: &str) -> Option<Group<'_>> {
        self.stats.record_group_read();
        let key = path::normalize(path);
        let catalog = self.catalog();
        catalog.group(key)?;

        let mut subgroups = Vec::new();
        let mut datasets = Vec::new();
        for child in catalog.children(key) {
            let attrs = catalog.attributes(child).cloned().unwrap_or_default();
            if catalog.group_exists(child) {
                subgroups.push(SubgroupInfo {
                    name: path::name_of(child).to_string(),
                    path: path::display(child),
                    attrs,
                });
            } else if let Some(meta) = catalog.array(child) {
                datasets.push(SubdatasetInfo {
                    name: path::name_of(child).to_string(),
                    path: path::display(child),
                    shape: meta.shape.clone(),
                    dtype: meta.dtype.clone(),
                    attrs,
                });
            }
        }

        Some(Group {
            store: self,
            path: path::display(key),
            attrs: catalog.attributes(key).cloned().unwrap_or_default(),
            subgroups,
            datasets,
        })
    }

    /// Dataset at `path`, or `None` if there is no `.zarray` there.
    pub fn get_dataset(&self, path: &str) -> Option<Dataset<'_>> {
        self.stats.record_dataset_read();
        let key = path::normalize(path);
        let meta = self.catalog().array(key)?;

        Some(Dataset {
            store: self,
            name: path::name_of(key).to_string(),
            path: path::display(key),
            shape: meta.shape.clone(),
            chunks: meta.chunks.clone(),
            dtype: meta.dtype.clone(),
            attrs: self.catalog().attributes(key).cloned().unwrap_or_default(),
        })
    }

    /// Read dataset data, optionally restricted to a slice.
    ///
    /// Returns `None` if there is no dataset at `path`. A one-element result
    /// of a dataset marked `_SCALAR` comes back as a bare scalar.
    #[instrument(skip(self))]
    pub async fn get_dataset_data(
        &self,
        path: &str,
        options: &DataOptions,
    ) -> Result<Option<DatasetData>> {
        if options.slice.len() > MAX_SLICE_DIMS {
            warn!(path = %path, dims = options.slice.len(), "Rejected slice");
            return Err(StoreError::protocol(format!(
                "cannot slice more than {MAX_SLICE_DIMS} dimensions at a time, got {} for {path}",
                options.slice.len()
            )));
        }

        let key = path::normalize(path);
        if self.catalog().array(key).is_none() {
            debug!(path = %path, "No .zarray");
            return Ok(None);
        }
        self.stats.record_data_read();

        let (data, shape) = read_slice(&self.client, key, &options.slice, options.cache_bust).await?;
        let scalar = self
            .catalog()
            .attributes(key)
            .and_then(|attrs| attrs.get(SCALAR_MARKER))
            .is_some_and(|v| v.is_truthy());

        Ok(Some(DatasetData::from_array(data, shape, scalar)))
    }

    /// Forward an attribute replacement to the write hook.
    pub async fn set_attrs(&self, path: &str, attrs: Attributes) -> Result<()> {
        let Some(writer) = &self.writer else {
            return Err(StoreError::Unsupported(format!(
                "set_attrs on {}: store was opened without a write dispatch",
                path::display(path)
            )));
        };
        writer
            .dispatch(WriteAction::SetAttrs {
                path: path::display(path),
                attrs,
            })
            .await
    }
}

/// View of one group.
#[derive(Debug, Clone)]
pub struct Group<'a> {
    store: &'a ZarrStore,
    path: String,
    attrs: Attributes,
    subgroups: Vec<SubgroupInfo>,
    datasets: Vec<SubdatasetInfo>,
}

impl<'a> Group<'a> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        path::name_of(&self.path)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn subgroups(&self) -> &[SubgroupInfo] {
        &self.subgroups
    }

    pub fn datasets(&self) -> &[SubdatasetInfo] {
        &self.datasets
    }

    /// Child group `name`.
    pub fn get_group(&self, name: &str) -> Option<Group<'a>> {
        self.store.get_group(&path::join(&self.path, name))
    }

    /// Child dataset `name`.
    pub fn get_dataset(&self, name: &str) -> Option<Dataset<'a>> {
        self.store.get_dataset(&path::join(&self.path, name))
    }

    /// Data of child dataset `name`.
    pub async fn get_dataset_data(
        &self,
        name: &str,
        options: &DataOptions,
    ) -> Result<Option<DatasetData>> {
        self.store
            .get_dataset_data(&path::join(&self.path, name), options)
            .await
    }

    pub async fn set_attrs(&self, attrs: Attributes) -> Result<()> {
        self.store.set_attrs(&self.path, attrs).await
    }
}

/// View of one dataset.
#[derive(Debug, Clone)]
pub struct Dataset<'a> {
    store: &'a ZarrStore,
    name: String,
    path: String,
    shape: Vec<u64>,
    chunks: Vec<u64>,
    dtype: String,
    attrs: Attributes,
}

impl<'a> Dataset<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn chunks(&self) -> &[u64] {
        &self.chunks
    }

    pub fn dtype(&self) -> &str {
        &self.dtype
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn is_scalar(&self) -> bool {
        self.attrs.get(SCALAR_MARKER).is_some_and(|v| v.is_truthy())
    }

    /// Read this dataset's data.
    pub async fn read(&self, options: &DataOptions) -> Result<Option<DatasetData>> {
        self.store.get_dataset_data(&self.path, options).await
    }

    pub async fn set_attrs(&self, attrs: Attributes) -> Result<()> {
        self.store.set_attrs(&self.path, attrs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use bytes::Bytes;
    use serde_json::json;

    async fn store() -> ZarrStore {
        let doc = json!({
            "zarr_consolidated_format": 1,
            "metadata": {
                ".zgroup": {"zarr_format": 2},
                ".zattrs": {"name": "root"},
                "units/.zgroup": {"zarr_format": 2},
                "units/.zattrs": {"count": 2},
                "units/ids/.zarray": {
                    "shape": [2], "chunks": [2], "dtype": "<i4",
                    "compressor": null, "filters": null, "fill_value": 0, "order": "C"
                },
                "rate/.zarray": {
                    "shape": [1], "chunks": [1], "dtype": "<f8",
                    "compressor": null, "filters": null, "fill_value": 0, "order": "C"
                },
                "rate/.zattrs": {"_SCALAR": true}
            }
        });
        let fetcher = Arc::new(MemoryFetcher::new([
            (".zmetadata", Bytes::from(doc.to_string())),
            ("units/ids/0", Bytes::from(vec![7, 0, 0, 0, 9, 0, 0, 0])),
            ("rate/0", Bytes::from(30000.0f64.to_le_bytes().to_vec())),
        ]));
        ZarrStore::open(fetcher, StoreConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_root_group() {
        let store = store().await;
        let root = store.get_group("").unwrap();
        assert_eq!(root.path(), "/");
        assert_eq!(root.attrs()["name"].as_str(), Some("root"));
        assert_eq!(root.subgroups().len(), 1);
        assert_eq!(root.subgroups()[0].path, "/units");
        assert_eq!(root.datasets().len(), 1);
        assert_eq!(root.datasets()[0].name, "rate");
        assert!(store.get_group("/rate").is_none());
        assert!(store.get_group("/nope").is_none());
    }

    #[tokio::test]
    async fn test_relative_accessors() {
        let store = store().await;
        let units = store.get_group("/").unwrap().get_group("units").unwrap();
        assert_eq!(units.datasets()[0].shape, vec![2]);
        let ids = units.get_dataset("ids").unwrap();
        assert_eq!(ids.path(), "/units/ids");
        assert_eq!(ids.dtype(), "<i4");

        let data = units.get_dataset_data("ids", &DataOptions::all()).await.unwrap().unwrap();
        assert_eq!(data.as_array(), Some(&zarr_codec::ArrayData::Int32(vec![7, 9])));
        assert_eq!(store.stats().group_reads, 2);
        assert_eq!(store.stats().data_reads, 1);
    }

    #[tokio::test]
    async fn test_scalar_unwrap() {
        let store = store().await;
        let rate = store.get_dataset("/rate").unwrap();
        assert!(rate.is_scalar());
        let data = rate.read(&DataOptions::all()).await.unwrap().unwrap();
        assert_eq!(data.as_scalar(), Some(zarr_codec::Scalar::Float(30000.0)));
    }

    #[tokio::test]
    async fn test_missing_dataset_data_is_none() {
        let store = store().await;
        assert!(store
            .get_dataset_data("/units", &DataOptions::all())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_set_attrs_without_writer() {
        let store = store().await;
        let root = store.get_group("/").unwrap();
        assert!(matches!(
            root.set_attrs(Attributes::new()).await,
            Err(StoreError::Unsupported(_))
        ));
    }
}
