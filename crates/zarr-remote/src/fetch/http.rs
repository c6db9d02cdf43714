//! HTTP backend: plain GETs against a store base URL.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, warn};

use super::{FetchRequest, ObjectFetcher};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Source of `cb` query values.
///
/// Values come from the wall clock in milliseconds but never repeat or go
/// backwards within one process, even when two requests land in the same
/// millisecond.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self
                .last
                .compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Fetches store objects from `<base_url>/<key>`.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    cache_buster: CacheBuster,
}

impl HttpFetcher {
    /// Create a fetcher for the store rooted at `base_url`.
    pub fn new(base_url: &str, config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::Config)?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .tcp_nodelay(true)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(base_url, client))
    }

    /// Use an already configured client.
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache_buster: CacheBuster::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &FetchRequest) -> String {
        let url = self.describe(&request.key);
        if request.cache_bust {
            format!("{url}?cb={}", self.cache_buster.next())
        } else {
            url
        }
    }
}

#[async_trait]
impl ObjectFetcher for HttpFetcher {
    #[instrument(skip(self), fields(key = %request.key))]
    async fn fetch(&self, request: &FetchRequest) -> Result<Option<Bytes>> {
        let url = self.url_for(request);

        let mut builder = self.client.get(&url);
        if let Some(range) = request.range {
            builder = builder.header(header::RANGE, range.to_header());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::fetch(&url, e))?;

        let status = response.status();
        let ranged_whole = match status {
            StatusCode::NOT_FOUND => {
                debug!(url = %url, "Object not found");
                return Ok(None);
            }
            StatusCode::PARTIAL_CONTENT => false,
            StatusCode::OK => request.range.is_some(),
            status => {
                warn!(url = %url, status = %status, "Unexpected response status");
                return Err(StoreError::fetch(&url, status));
            }
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::fetch(&url, e))?;

        let body = match request.range {
            // Server ignored the Range header and sent the whole object
            Some(range) if ranged_whole => {
                let start = range.start as usize;
                let end = range.end as usize;
                if end > body.len() {
                    return Err(StoreError::fetch(
                        &url,
                        format!("range {range} beyond object of {} bytes", body.len()),
                    ));
                }
                body.slice(start..end)
            }
            _ => body,
        };

        debug!(url = %url, size = body.len(), "Fetched object");
        Ok(Some(body))
    }

    fn describe(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_buster_is_strictly_increasing() {
        let buster = CacheBuster::new();
        let mut last = 0;
        for _ in 0..1000 {
            let next = buster.next();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_urls() {
        let fetcher = HttpFetcher::new("https://example.org/data.zarr/", &StoreConfig::default()).unwrap();
        assert_eq!(fetcher.base_url(), "https://example.org/data.zarr");
        assert_eq!(fetcher.describe("/a/0.0"), "https://example.org/data.zarr/a/0.0");

        let plain = fetcher.url_for(&FetchRequest::whole(".zmetadata"));
        assert_eq!(plain, "https://example.org/data.zarr/.zmetadata");

        let busted = fetcher.url_for(&FetchRequest::whole(".zmetadata").with_cache_bust(true));
        assert!(busted.starts_with("https://example.org/data.zarr/.zmetadata?cb="));
    }
}
