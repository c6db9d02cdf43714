//! Store locations accepted on the command line.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use object_store::{aws::AmazonS3Builder, local::LocalFileSystem};
use zarr_remote::{ObjectStoreFetcher, StoreConfig, ZarrStore};

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSource {
    /// `http://` or `https://` base URL.
    Http(String),
    /// `s3://bucket/prefix`, credentials from the standard AWS environment.
    S3 { bucket: String, prefix: String },
    /// A directory on the local filesystem.
    Local(PathBuf),
}

impl FromStr for StoreSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            bail!("empty store location");
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Self::Http(s.trim_end_matches('/').to_string()));
        }
        if let Some(rest) = s.strip_prefix("s3://") {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                bail!("no bucket in {s}");
            }
            return Ok(Self::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.trim_matches('/').to_string(),
            });
        }
        let path = s.strip_prefix("file://").unwrap_or(s);
        Ok(Self::Local(PathBuf::from(path)))
    }
}

impl StoreSource {
    /// Open the store with the matching backend.
    pub async fn open(&self, config: StoreConfig) -> Result<ZarrStore> {
        let store = match self {
            Self::Http(url) => ZarrStore::open_url(url, config).await?,
            Self::S3 { bucket, prefix } => {
                let s3 = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .with_context(|| format!("failed to create S3 client for bucket {bucket}"))?;
                let fetcher = ObjectStoreFetcher::new(Arc::new(s3), prefix);
                ZarrStore::open(Arc::new(fetcher), config).await?
            }
            Self::Local(dir) => {
                let fs = LocalFileSystem::new_with_prefix(dir)
                    .with_context(|| format!("cannot open directory {}", dir.display()))?;
                let fetcher = ObjectStoreFetcher::new(Arc::new(fs), "");
                ZarrStore::open(Arc::new(fetcher), config).await?
            }
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::StoreFixture;
    use zarr_codec::{ArrayData, ArrayMetadata};
    use zarr_remote::DataOptions;

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            "https://example.org/a.zarr/".parse::<StoreSource>().unwrap(),
            StoreSource::Http("https://example.org/a.zarr".into())
        );
        assert_eq!(
            "s3://bucket/sessions/s01.zarr".parse::<StoreSource>().unwrap(),
            StoreSource::S3 {
                bucket: "bucket".into(),
                prefix: "sessions/s01.zarr".into()
            }
        );
        assert_eq!(
            "s3://bucket".parse::<StoreSource>().unwrap(),
            StoreSource::S3 {
                bucket: "bucket".into(),
                prefix: String::new()
            }
        );
        assert_eq!(
            "file:///data/a.zarr".parse::<StoreSource>().unwrap(),
            StoreSource::Local("/data/a.zarr".into())
        );
        assert!("s3:///x".parse::<StoreSource>().is_err());
        assert!("".parse::<StoreSource>().is_err());
    }

    #[tokio::test]
    async fn test_open_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = StoreFixture::new().array(
            "counts",
            ArrayMetadata::new(vec![5], vec![2], "<u2"),
            &ArrayData::UInt16(vec![1, 2, 3, 4, 5]),
        );
        for (key, bytes) in fixture.objects() {
            let path = dir.path().join(&key);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, &bytes).unwrap();
        }

        let source = StoreSource::Local(dir.path().to_path_buf());
        let store = source.open(StoreConfig::default()).await.unwrap();
        let data = store
            .get_dataset_data("/counts", &DataOptions::slice(vec![1..4]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data.as_array(), Some(&ArrayData::UInt16(vec![2, 3, 4])));
    }
}
