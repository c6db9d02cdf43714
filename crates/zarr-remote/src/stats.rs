//! Per-store counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by one store instance.
#[derive(Debug, Default)]
pub struct StoreStats {
    network_fetches: AtomicU64,
    bytes_fetched: AtomicU64,
    cache_hits: AtomicU64,
    shared_waits: AtomicU64,
    not_found: AtomicU64,
    failed_fetches: AtomicU64,
    group_reads: AtomicU64,
    dataset_reads: AtomicU64,
    data_reads: AtomicU64,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_fetch(&self, bytes: Option<usize>) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
        match bytes {
            Some(n) => {
                self.bytes_fetched.fetch_add(n as u64, Ordering::Relaxed);
            }
            None => {
                self.not_found.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_failure(&self) {
        self.failed_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller waited on another caller's fetch and reused its result.
    pub(crate) fn record_shared_wait(&self) {
        self.shared_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_group_read(&self) {
        self.group_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dataset_read(&self) {
        self.dataset_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_data_read(&self) {
        self.data_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            shared_waits: self.shared_waits.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed_fetches: self.failed_fetches.load(Ordering::Relaxed),
            group_reads: self.group_reads.load(Ordering::Relaxed),
            dataset_reads: self.dataset_reads.load(Ordering::Relaxed),
            data_reads: self.data_reads.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Requests that reached the backend, 404s included.
    pub network_fetches: u64,
    pub bytes_fetched: u64,
    /// Reads answered from the cache without waiting.
    pub cache_hits: u64,
    /// Reads answered from the cache after waiting on an identical read.
    pub shared_waits: u64,
    pub not_found: u64,
    pub failed_fetches: u64,
    pub group_reads: u64,
    pub dataset_reads: u64,
    pub data_reads: u64,
}

impl StatsSnapshot {
    /// Fraction of reads served without a network request (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.cache_hits + self.shared_waits;
        let total = served + self.network_fetches;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}
