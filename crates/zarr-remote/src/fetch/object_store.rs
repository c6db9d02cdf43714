//! Backend over any `object_store::ObjectStore` (S3, MinIO, local files).

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{path::Path, ObjectStore};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{FetchRequest, ObjectFetcher};
use crate::error::{Result, StoreError};

/// Reads store objects below `prefix` in an object store.
///
/// Cache busting has no meaning here and is ignored.
pub struct ObjectStoreFetcher {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn location(&self, key: &str) -> Path {
        let key = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            Path::from(key)
        } else {
            Path::from(format!("{}/{}", self.prefix, key))
        }
    }
}

#[async_trait]
impl ObjectFetcher for ObjectStoreFetcher {
    #[instrument(skip(self), fields(key = %request.key))]
    async fn fetch(&self, request: &FetchRequest) -> Result<Option<Bytes>> {
        let location = self.location(&request.key);

        let result = match request.range {
            Some(range) => {
                self.store
                    .get_range(&location, range.start as usize..range.end as usize)
                    .await
            }
            None => match self.store.get(&location).await {
                Ok(result) => result.bytes().await,
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(bytes) => {
                debug!(location = %location, size = bytes.len(), "Read object");
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => {
                debug!(location = %location, "Object not found");
                Ok(None)
            }
            Err(e) => Err(StoreError::fetch(location.to_string(), e)),
        }
    }

    fn describe(&self, key: &str) -> String {
        self.location(key).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ByteRange;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_reads_objects_and_ranges() {
        let store = Arc::new(InMemory::new());
        store
            .put(&Path::from("root/data.zarr/a/0"), Bytes::from_static(b"0123456789").into())
            .await
            .unwrap();

        let fetcher = ObjectStoreFetcher::new(store, "/root/data.zarr/");
        assert_eq!(fetcher.describe("a/0"), "root/data.zarr/a/0");

        let whole = fetcher.fetch(&FetchRequest::whole("a/0")).await.unwrap();
        assert_eq!(whole.as_deref(), Some(&b"0123456789"[..]));

        let part = fetcher
            .fetch(&FetchRequest::range("a/0", ByteRange::new(2, 5)))
            .await
            .unwrap();
        assert_eq!(part.as_deref(), Some(&b"234"[..]));
    }

    #[tokio::test]
    async fn test_missing_object_is_none() {
        let fetcher = ObjectStoreFetcher::new(Arc::new(InMemory::new()), "");
        assert_eq!(fetcher.fetch(&FetchRequest::whole("nope")).await.unwrap(), None);
    }
}
