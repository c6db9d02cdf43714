//! Object fetch backends.
//!
//! A backend answers three questions about a key: here are its bytes, it
//! does not exist (`Ok(None)`), or the attempt failed (`Err`). Caching,
//! deduplication and decoding live above this layer in `RemoteClient`.

mod http;
mod memory;
mod object_store;

pub use self::http::{CacheBuster, HttpFetcher};
pub use self::memory::MemoryFetcher;
pub use self::object_store::ObjectStoreFetcher;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::Result;

/// Half-open byte window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of an HTTP `Range` header; the end is inclusive there.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Object key relative to the store root, without a leading slash.
    pub key: String,
    pub range: Option<ByteRange>,
    /// Bypass any intermediary caches between us and the origin.
    pub cache_bust: bool,
}

impl FetchRequest {
    pub fn whole(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            range: None,
            cache_bust: false,
        }
    }

    pub fn range(key: impl Into<String>, range: ByteRange) -> Self {
        Self {
            key: key.into(),
            range: Some(range),
            cache_bust: false,
        }
    }

    pub fn with_cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }
}

/// Source of store objects.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Fetch an object or a byte window of it.
    ///
    /// # Returns
    /// * `Some(bytes)` if the object exists
    /// * `None` if the backend reports it as absent
    async fn fetch(&self, request: &FetchRequest) -> Result<Option<Bytes>>;

    /// Human-readable location of `key`, used in logs and errors.
    fn describe(&self, key: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header_is_inclusive() {
        assert_eq!(ByteRange::new(10, 20).to_header(), "bytes=10-19");
        assert_eq!(ByteRange::new(0, 1).to_header(), "bytes=0-0");
        assert_eq!(ByteRange::new(5, 9).len(), 4);
        assert!(ByteRange::new(5, 5).is_empty());
    }
}
