//! Remote object client: cached, deduplicated reads over an `ObjectFetcher`.
//!
//! # Request lifecycle
//!
//! ```text
//! read_binary(path, options)
//!      │
//!      ├─► validate byte window (empty window: return, no network)
//!      │
//!      ├─► cache hit? ──────────────────────────► return
//!      │
//!      ├─► take the per-key lock
//!      │         │
//!      │         └─► cache filled while waiting? ► return
//!      │
//!      └─► spawned task (owns the lock):
//!                fetch → decode → cache → release
//! ```
//!
//! The spawned task keeps running even if the caller stops waiting, so the
//! result still lands in the cache for the next reader.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};
use zarr_codec::{ChunkCodec, DecodedChunk};

use crate::attrs::AttrValue;
use crate::catalog::Catalog;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::fetch::{ByteRange, FetchRequest, ObjectFetcher};
use crate::path;
use crate::stats::StoreStats;

/// Options of one binary read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Decode the object as a chunk of its owning array.
    pub decode: bool,
    pub start_byte: Option<u64>,
    pub end_byte: Option<u64>,
    /// Skip the cache lookup and bypass intermediary caches.
    pub cache_bust: bool,
}

impl ReadOptions {
    pub fn raw() -> Self {
        Self::default()
    }

    pub fn decoded() -> Self {
        Self {
            decode: true,
            ..Self::default()
        }
    }

    /// Half-open byte window `[start, end)`.
    pub fn range(start: u64, end: u64) -> Self {
        Self {
            start_byte: Some(start),
            end_byte: Some(end),
            ..Self::default()
        }
    }

    pub fn with_cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }

    /// Check the option combination and resolve the byte window.
    fn window(&self, path: &str) -> Result<Option<ByteRange>> {
        match (self.start_byte, self.end_byte) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(StoreError::protocol(format!(
                "start_byte given without end_byte for {path}"
            ))),
            (None, Some(_)) => Err(StoreError::protocol(format!(
                "end_byte given without start_byte for {path}"
            ))),
            (Some(_), Some(_)) if self.decode => Err(StoreError::protocol(format!(
                "cannot decode and read a byte range at the same time for {path}"
            ))),
            (Some(start), Some(end)) if end < start => Err(StoreError::protocol(format!(
                "end_byte {end} is before start_byte {start} for {path}"
            ))),
            (Some(start), Some(end)) => Ok(Some(ByteRange::new(start, end))),
        }
    }
}

/// Cache and in-flight identity of a read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadKey {
    pub path: String,
    pub decode: bool,
    pub range: Option<ByteRange>,
}

/// Result of a binary read.
#[derive(Debug, Clone)]
pub enum Payload {
    Bytes(Bytes),
    Chunk(Arc<DecodedChunk>),
}

impl Payload {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Chunk(_) => None,
        }
    }

    pub fn into_chunk(self) -> Option<Arc<DecodedChunk>> {
        match self {
            Self::Chunk(c) => Some(c),
            Self::Bytes(_) => None,
        }
    }
}

/// `None` records a confirmed-missing object.
type CacheEntry = Option<Payload>;

struct ClientInner {
    fetcher: Arc<dyn ObjectFetcher>,
    catalog: Arc<Catalog>,
    config: StoreConfig,
    cache: RwLock<HashMap<ReadKey, CacheEntry>>,
    in_flight: Mutex<HashMap<ReadKey, Arc<Mutex<()>>>>,
    codecs: RwLock<HashMap<String, Arc<ChunkCodec>>>,
    stats: Arc<StoreStats>,
}

/// Shared handle to one store's fetch layer. Clones share cache and locks.
#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<ClientInner>,
}

impl RemoteClient {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        catalog: Arc<Catalog>,
        config: StoreConfig,
        stats: Arc<StoreStats>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                fetcher,
                catalog,
                config,
                cache: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                codecs: RwLock::new(HashMap::new()),
                stats,
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> &StoreStats {
        &self.inner.stats
    }

    /// Location of `path` as the backend names it.
    pub fn describe(&self, path: &str) -> String {
        self.inner.fetcher.describe(path::normalize(path))
    }

    /// Read a JSON object.
    ///
    /// Catalog entries are answered from memory. Dot-prefixed keys missing
    /// from the catalog are reported missing without a request.
    #[instrument(skip(self))]
    pub async fn read_json(&self, path: &str) -> Result<Option<AttrValue>> {
        let key = path::normalize(path);
        if let Some(value) = self.inner.catalog.lookup(key) {
            return Ok(Some(value.clone()));
        }
        if path::is_hidden(key) {
            return Ok(None);
        }

        let Some(bytes) = self.read_bytes(key, ReadOptions::raw()).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => Ok(Some(AttrValue::from(value))),
            Err(e) => {
                warn!(path = %key, text = %String::from_utf8_lossy(&bytes), "Malformed JSON object");
                Err(StoreError::protocol(format!("failed to parse JSON for {key}: {e}")))
            }
        }
    }

    /// Read an object, a byte window of it, or its decoded chunk.
    #[instrument(skip(self))]
    pub async fn read_binary(&self, path: &str, options: ReadOptions) -> Result<Option<Payload>> {
        let range = options.window(path)?;
        if range.is_some_and(|r| r.is_empty()) {
            return Ok(Some(Payload::Bytes(Bytes::new())));
        }

        let key = ReadKey {
            path: path::normalize(path).to_string(),
            decode: options.decode,
            range,
        };
        let cache_bust =
            options.cache_bust || (options.decode && self.inner.config.cache_bust_chunks);

        if !cache_bust {
            if let Some(entry) = self.cached(&key).await {
                self.inner.stats.record_hit();
                return Ok(entry);
            }
        }

        let lock = {
            let mut in_flight = self.inner.in_flight.lock().await;
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };
        let guard = lock.lock_owned().await;

        if !cache_bust {
            if let Some(entry) = self.cached(&key).await {
                self.inner.stats.record_shared_wait();
                drop(guard);
                self.release(&key).await;
                return Ok(entry);
            }
        }

        let client = self.clone();
        let task = tokio::spawn(async move {
            let result = client.fetch_uncached(&key, cache_bust).await;
            match &result {
                Ok(entry) => {
                    client.inner.cache.write().await.insert(key.clone(), entry.clone());
                }
                Err(e) => {
                    client.inner.stats.record_failure();
                    warn!(path = %key.path, error = %e, "Read failed");
                }
            }
            drop(guard);
            client.release(&key).await;
            result
        });

        task.await
            .map_err(|e| StoreError::Internal(format!("fetch task for {path} failed: {e}")))?
    }

    /// Raw bytes of an object or byte window.
    pub async fn read_bytes(&self, path: &str, options: ReadOptions) -> Result<Option<Bytes>> {
        if options.decode {
            return Err(StoreError::protocol(format!(
                "read_bytes cannot decode {path}; use read_chunk"
            )));
        }
        Ok(self
            .read_binary(path, options)
            .await?
            .and_then(|p| p.as_bytes().cloned()))
    }

    /// Decoded chunk `coords` of the array at `array_path`.
    pub async fn read_chunk(
        &self,
        array_path: &str,
        coords: &[u64],
        cache_bust: bool,
    ) -> Result<Option<Arc<DecodedChunk>>> {
        let array_path = path::normalize(array_path);
        let meta = self.inner.catalog.array(array_path).ok_or_else(|| {
            StoreError::protocol(format!("no array at {}", path::display(array_path)))
        })?;
        let key = path::metadata_key(array_path, &meta.chunk_key(coords));
        // unsupported codecs fail here even when the chunk object is absent
        self.codec(array_path, coords).await?;
        let options = ReadOptions::decoded().with_cache_bust(cache_bust);
        Ok(self
            .read_binary(&key, options)
            .await?
            .and_then(Payload::into_chunk))
    }

    /// Drop the in-flight lock of `key` once nobody holds or waits on it.
    async fn release(&self, key: &ReadKey) {
        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            in_flight.remove(key);
        }
    }

    /// Number of keys with a read in progress or waiting.
    pub async fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }

    async fn cached(&self, key: &ReadKey) -> Option<CacheEntry> {
        self.inner.cache.read().await.get(key).cloned()
    }

    /// Codec of an array, built once per client. `coords` names the chunk
    /// being decoded in errors.
    pub(crate) async fn codec(&self, array_path: &str, coords: &[u64]) -> Result<Arc<ChunkCodec>> {
        if let Some(codec) = self.inner.codecs.read().await.get(array_path) {
            return Ok(Arc::clone(codec));
        }
        let meta = self.inner.catalog.array(array_path).ok_or_else(|| {
            StoreError::protocol(format!("no .zarray for {}", path::display(array_path)))
        })?;
        let codec = Arc::new(
            ChunkCodec::from_metadata(meta)
                .map_err(|e| StoreError::decode(path::display(array_path), coords, e))?,
        );
        self.inner
            .codecs
            .write()
            .await
            .insert(array_path.to_string(), Arc::clone(&codec));
        Ok(codec)
    }

    /// The array owning a chunk key, and the key relative to that array.
    fn owning_array<'a>(&self, key: &'a str) -> Option<(&'a str, &'a str)> {
        let mut split = key.len();
        while let Some(i) = key[..split].rfind('/') {
            if self.inner.catalog.array(&key[..i]).is_some() {
                return Some((&key[..i], &key[i + 1..]));
            }
            split = i;
        }
        self.inner.catalog.array("").map(|_| ("", key))
    }

    /// Backend request for a read, following chunk refs into packed files.
    fn request_for(&self, key: &ReadKey, cache_bust: bool) -> Result<FetchRequest> {
        let request = match (self.inner.catalog.chunk_ref(&key.path), key.range) {
            (None, None) => FetchRequest::whole(key.path.as_str()),
            (None, Some(range)) => FetchRequest::range(key.path.as_str(), range),
            (Some(r), None) => {
                FetchRequest::range(r.file.as_str(), ByteRange::new(r.offset, r.offset + r.length))
            }
            (Some(r), Some(range)) => {
                if range.end > r.length {
                    return Err(StoreError::protocol(format!(
                        "byte range {range} exceeds {} bytes of {}",
                        r.length, key.path
                    )));
                }
                FetchRequest::range(
                    r.file.as_str(),
                    ByteRange::new(r.offset + range.start, r.offset + range.end),
                )
            }
        };
        Ok(request.with_cache_bust(cache_bust))
    }

    async fn fetch_uncached(&self, key: &ReadKey, cache_bust: bool) -> Result<CacheEntry> {
        let request = self.request_for(key, cache_bust)?;
        let fetched = self.inner.fetcher.fetch(&request).await?;
        self.inner.stats.record_fetch(fetched.as_ref().map(Bytes::len));

        let Some(bytes) = fetched else {
            debug!(path = %key.path, "Not found");
            return Ok(None);
        };
        if !key.decode {
            return Ok(Some(Payload::Bytes(bytes)));
        }

        let (array_path, chunk_key) = self.owning_array(&key.path).ok_or_else(|| {
            StoreError::protocol(format!("no .zarray owns {}", key.path))
        })?;
        let coords = self
            .inner
            .catalog
            .array(array_path)
            .and_then(|meta| meta.parse_chunk_key(chunk_key))
            .ok_or_else(|| {
                StoreError::protocol(format!(
                    "{chunk_key} is not a chunk key of {}",
                    path::display(array_path)
                ))
            })?;
        let codec = self.codec(array_path, &coords).await?;
        let chunk = codec
            .decode_chunk(&coords, &bytes)
            .map_err(|e| StoreError::decode(path::display(array_path), &coords, e))?;

        debug!(
            path = %key.path,
            encoded_bytes = bytes.len(),
            elements = chunk.data.len(),
            "Decoded chunk"
        );
        Ok(Some(Payload::Chunk(Arc::new(chunk))))
    }
}
