//! Error types for chunk decoding.

use thiserror::Error;

/// Errors raised while interpreting array metadata or transforming chunk bytes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The dtype string does not describe a supported element type.
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(String),

    /// The compressor id is not one this pipeline implements.
    #[error("unsupported compressor: {0}")]
    UnsupportedCompressor(String),

    /// The filter id (or its configuration) is not supported.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Invalid codec configuration.
    #[error("invalid codec configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid array metadata.
    #[error("invalid array metadata: {0}")]
    InvalidMetadata(String),

    /// Decompression error.
    #[error("decompression error: {0}")]
    DecompressionError(String),

    /// Compression error.
    #[error("compression error: {0}")]
    CompressionError(String),

    /// The decoded byte length matches none of the acceptable chunk sizes.
    #[error("chunk holds {actual} bytes, expected one of {expected:?}")]
    LengthMismatch { expected: Vec<usize>, actual: usize },

    /// Two typed buffers of different element types were combined.
    #[error("element type mismatch: {0}")]
    TypeMismatch(String),
}

impl CodecError {
    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
