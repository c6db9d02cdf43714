//! Configuration for a remote store.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the fetch backends and the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// User-Agent header sent by the HTTP backend.
    pub user_agent: String,

    /// Cache-bust every decoded chunk read. Raw and JSON reads are unaffected.
    pub cache_bust_chunks: bool,

    /// Name of the consolidated metadata document at the store root.
    pub metadata_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("zarr-remote/{}", env!("CARGO_PKG_VERSION")),
            cache_bust_chunks: false,
            metadata_key: ".zmetadata".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ZARR_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("ZARR_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.connect_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("ZARR_USER_AGENT") {
            config.user_agent = val;
        }

        if let Ok(val) = std::env::var("ZARR_CACHE_BUST_CHUNKS") {
            config.cache_bust_chunks = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("ZARR_METADATA_KEY") {
            config.metadata_key = val;
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }

        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs must be > 0".to_string());
        }

        if self.metadata_key.is_empty() || self.metadata_key.contains('/') {
            return Err("metadata_key must be a bare object name".to_string());
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metadata_key, ".zmetadata");
        assert!(!config.cache_bust_chunks);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = StoreConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            metadata_key: "nested/.zmetadata".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
