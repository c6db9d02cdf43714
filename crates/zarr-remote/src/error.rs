//! Error types for the remote store.

use thiserror::Error;
use zarr_codec::CodecError;

/// Errors that can occur while opening or reading a remote store.
///
/// A missing object is not an error: read calls return `Ok(None)` for it.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The consolidated metadata document could not be loaded.
    #[error("failed to open store at {url}: {message}")]
    OpenFailed { url: String, message: String },

    /// A catalog entry or fetched JSON object is malformed.
    #[error("failed to parse {path}: {message}")]
    CatalogParse {
        path: String,
        message: String,
        raw: String,
    },

    /// The caller asked for something the read protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A chunk could not be decoded.
    #[error("failed to decode {path} chunk {chunk:?}: {source}")]
    Decode {
        path: String,
        chunk: Vec<u64>,
        #[source]
        source: CodecError,
    },

    /// The backend answered with something other than data or "not found".
    #[error("fetch of {url} failed: {status}")]
    Fetch { url: String, status: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation needs a collaborator this store was not given.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A background task failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a Protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a Fetch error.
    pub fn fetch(url: impl Into<String>, status: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            status: status.to_string(),
        }
    }

    /// Create a Decode error for one chunk of an array.
    pub fn decode(path: impl Into<String>, chunk: &[u64], source: CodecError) -> Self {
        Self::Decode {
            path: path.into(),
            chunk: chunk.to_vec(),
            source,
        }
    }

    /// Whether a later attempt at the same read could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Internal(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
