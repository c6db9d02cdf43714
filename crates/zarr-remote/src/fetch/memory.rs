//! In-process backend with request accounting.
//!
//! Serves a fixed set of objects from memory. Every request is logged, an
//! artificial latency can be added, and failures can be injected per key,
//! which makes it the backend of choice for tests and for embedding
//! pre-built stores.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{FetchRequest, ObjectFetcher};
use crate::error::{Result, StoreError};

/// In-memory object map.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    objects: RwLock<HashMap<String, Bytes>>,
    latency: Option<Duration>,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<FetchRequest>>,
    fetch_count: AtomicU64,
}

impl MemoryFetcher {
    pub fn new<K, I>(objects: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Bytes)>,
    {
        Self {
            objects: RwLock::new(objects.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            ..Default::default()
        }
    }

    /// Delay every fetch by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn insert(&self, key: impl Into<String>, bytes: Bytes) {
        self.objects.write().await.insert(key.into(), bytes);
    }

    pub async fn remove(&self, key: &str) -> Option<Bytes> {
        self.objects.write().await.remove(key)
    }

    /// Make the next `times` fetches of `key` fail with a 503.
    pub async fn fail_next(&self, key: impl Into<String>, times: u32) {
        self.failures.lock().await.insert(key.into(), times);
    }

    /// Number of fetches answered so far, failures included.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Every request received, in arrival order.
    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received for `key`.
    pub async fn fetches_for(&self, key: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.key == key)
            .count()
    }

    async fn take_failure(&self, key: &str) -> bool {
        let mut failures = self.failures.lock().await;
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ObjectFetcher for MemoryFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Option<Bytes>> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().await.push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.take_failure(&request.key).await {
            debug!(key = %request.key, "Injected failure");
            return Err(StoreError::fetch(self.describe(&request.key), "503 Service Unavailable"));
        }

        let objects = self.objects.read().await;
        let Some(bytes) = objects.get(&request.key) else {
            return Ok(None);
        };

        match request.range {
            None => Ok(Some(bytes.clone())),
            Some(range) if range.end as usize <= bytes.len() => {
                Ok(Some(bytes.slice(range.start as usize..range.end as usize)))
            }
            Some(range) => Err(StoreError::fetch(
                self.describe(&request.key),
                format!("416 Range Not Satisfiable ({range} of {} bytes)", bytes.len()),
            )),
        }
    }

    fn describe(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ByteRange;

    fn fetcher() -> MemoryFetcher {
        MemoryFetcher::new([("a/0", Bytes::from_static(b"abcdef"))])
    }

    #[tokio::test]
    async fn test_whole_range_and_missing() {
        let f = fetcher();
        assert_eq!(
            f.fetch(&FetchRequest::whole("a/0")).await.unwrap().as_deref(),
            Some(&b"abcdef"[..])
        );
        assert_eq!(
            f.fetch(&FetchRequest::range("a/0", ByteRange::new(1, 3)))
                .await
                .unwrap()
                .as_deref(),
            Some(&b"bc"[..])
        );
        assert_eq!(f.fetch(&FetchRequest::whole("a/1")).await.unwrap(), None);
        assert!(f
            .fetch(&FetchRequest::range("a/0", ByteRange::new(4, 10)))
            .await
            .is_err());
        assert_eq!(f.fetch_count(), 4);
        assert_eq!(f.fetches_for("a/0").await, 3);
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let f = fetcher();
        f.fail_next("a/0", 2).await;
        assert!(f.fetch(&FetchRequest::whole("a/0")).await.is_err());
        assert!(f.fetch(&FetchRequest::whole("a/0")).await.is_err());
        assert!(f.fetch(&FetchRequest::whole("a/0")).await.unwrap().is_some());
    }
}
