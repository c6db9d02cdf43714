//! Byte-level compressors named by a `.zarray` `compressor` entry.

use std::io::{Cursor, Read};

use serde_json::Value;

use crate::blosc::BloscConfig;
use crate::error::{CodecError, Result};
use crate::metadata::CodecSpec;

/// Supported compressors. `compressor: null` is handled by the pipeline as
/// the identity and never reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    Zlib { level: u32 },
    Gzip { level: u32 },
    Zstd { level: i32 },
    Blosc(BloscConfig),
}

fn level_of(spec: &CodecSpec, default: i64, min: i64, max: i64) -> Result<i64> {
    let level = match spec.get("level") {
        None | Some(Value::Null) => default,
        Some(v) => v.as_i64().ok_or_else(|| {
            CodecError::invalid_configuration(format!("{} level must be an integer, got {v}", spec.id))
        })?,
    };
    if !(min..=max).contains(&level) {
        return Err(CodecError::invalid_configuration(format!(
            "{} level {level} outside {min}..={max}",
            spec.id
        )));
    }
    Ok(level)
}

impl Compressor {
    /// Build a compressor from its metadata entry. `typesize` is the array
    /// element size in bytes.
    pub fn from_spec(spec: &CodecSpec, typesize: usize) -> Result<Self> {
        match spec.id.as_str() {
            "zlib" => Ok(Self::Zlib {
                level: level_of(spec, 1, 0, 9)? as u32,
            }),
            "gzip" => Ok(Self::Gzip {
                level: level_of(spec, 1, 0, 9)? as u32,
            }),
            "zstd" => Ok(Self::Zstd {
                level: level_of(spec, 1, -131072, 22)? as i32,
            }),
            "blosc" => Ok(Self::Blosc(BloscConfig::from_spec(spec, typesize)?)),
            other => Err(CodecError::UnsupportedCompressor(other.to_string())),
        }
    }

    /// Metadata entry describing this compressor.
    pub fn to_spec(&self) -> CodecSpec {
        match *self {
            Self::Zlib { level } => CodecSpec::new("zlib").with("level", level),
            Self::Gzip { level } => CodecSpec::new("gzip").with("level", level),
            Self::Zstd { level } => CodecSpec::new("zstd").with("level", level),
            Self::Blosc(config) => config.to_spec(),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Zlib { .. } => "zlib",
            Self::Gzip { .. } => "gzip",
            Self::Zstd { .. } => "zstd",
            Self::Blosc(_) => "blosc",
        }
    }

    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let err = |e: std::io::Error| CodecError::DecompressionError(format!("{}: {e}", self.id()));
        match self {
            Self::Zlib { .. } => {
                flate2::read::ZlibDecoder::new(Cursor::new(encoded))
                    .read_to_end(&mut out)
                    .map_err(err)?;
            }
            Self::Gzip { .. } => {
                flate2::bufread::GzDecoder::new(Cursor::new(encoded))
                    .read_to_end(&mut out)
                    .map_err(err)?;
            }
            Self::Zstd { .. } => {
                out = zstd::stream::decode_all(Cursor::new(encoded)).map_err(err)?;
            }
            Self::Blosc(config) => {
                out = config.decode(encoded)?;
            }
        }
        Ok(out)
    }

    pub fn encode(&self, decoded: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let err = |e: std::io::Error| CodecError::CompressionError(format!("{}: {e}", self.id()));
        match *self {
            Self::Zlib { level } => {
                flate2::read::ZlibEncoder::new(Cursor::new(decoded), flate2::Compression::new(level))
                    .read_to_end(&mut out)
                    .map_err(err)?;
            }
            Self::Gzip { level } => {
                flate2::bufread::GzEncoder::new(Cursor::new(decoded), flate2::Compression::new(level))
                    .read_to_end(&mut out)
                    .map_err(err)?;
            }
            Self::Zstd { level } => {
                out = zstd::stream::encode_all(Cursor::new(decoded), level).map_err(err)?;
            }
            Self::Blosc(config) => {
                out = config.encode(decoded)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<u8> {
        (0u32..4096).flat_map(|i| (i % 97).to_le_bytes()).collect()
    }

    #[test]
    fn test_from_spec() {
        let spec = CodecSpec::new("zlib").with("level", 5);
        assert_eq!(Compressor::from_spec(&spec, 4).unwrap(), Compressor::Zlib { level: 5 });

        let spec = CodecSpec::new("gzip");
        assert_eq!(Compressor::from_spec(&spec, 4).unwrap(), Compressor::Gzip { level: 1 });

        let spec = CodecSpec::new("zstd").with("level", 3).with("checksum", false);
        assert_eq!(Compressor::from_spec(&spec, 4).unwrap(), Compressor::Zstd { level: 3 });
    }

    #[test]
    fn test_rejects_unknown_and_bad_levels() {
        assert!(matches!(
            Compressor::from_spec(&CodecSpec::new("lzma"), 4),
            Err(CodecError::UnsupportedCompressor(id)) if id == "lzma"
        ));
        assert!(matches!(
            Compressor::from_spec(&CodecSpec::new("zlib").with("level", 12), 4),
            Err(CodecError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Compressor::from_spec(&CodecSpec::new("zlib").with("level", json!("high")), 4),
            Err(CodecError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_each_compressor_shrinks_and_restores() {
        let input = sample();
        for c in [
            Compressor::Zlib { level: 6 },
            Compressor::Gzip { level: 6 },
            Compressor::Zstd { level: 3 },
            Compressor::from_spec(&CodecSpec::new("blosc"), 4).unwrap(),
        ] {
            let encoded = c.encode(&input).unwrap();
            assert!(encoded.len() < input.len(), "{} did not compress", c.id());
            assert_eq!(c.decode(&encoded).unwrap(), input);
        }
    }

    #[test]
    fn test_corrupt_input_is_decompression_error() {
        let garbage = vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01];
        for c in [
            Compressor::Zlib { level: 1 },
            Compressor::Gzip { level: 1 },
            Compressor::Zstd { level: 1 },
            Compressor::from_spec(&CodecSpec::new("blosc"), 4).unwrap(),
        ] {
            assert!(matches!(
                c.decode(&garbage),
                Err(CodecError::DecompressionError(_))
            ));
        }
    }
}
