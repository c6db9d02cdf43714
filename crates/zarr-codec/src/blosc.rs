//! Blosc compressor over the C library linked by `blosc-src`.
//!
//! Only the numcodecs v2 configuration is understood:
//! `{"id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0}`.

use std::ffi::{c_char, c_int, c_void};

use blosc_src::{
    blosc_cbuffer_validate, blosc_compress_ctx, blosc_decompress_ctx, blosc_get_complib_info,
    BLOSC_MAX_OVERHEAD,
};
use serde_json::Value;

use crate::error::{CodecError, Result};
use crate::metadata::CodecSpec;

/// Internal compressor used inside a blosc frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloscCompressor {
    BloscLz,
    Lz4,
    Lz4hc,
    Snappy,
    Zlib,
    Zstd,
}

impl BloscCompressor {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "blosclz" => Ok(Self::BloscLz),
            "lz4" => Ok(Self::Lz4),
            "lz4hc" => Ok(Self::Lz4hc),
            "snappy" => Ok(Self::Snappy),
            "zlib" => Ok(Self::Zlib),
            "zstd" => Ok(Self::Zstd),
            other => Err(CodecError::invalid_configuration(format!(
                "unknown blosc cname {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BloscLz => "blosclz",
            Self::Lz4 => "lz4",
            Self::Lz4hc => "lz4hc",
            Self::Snappy => "snappy",
            Self::Zlib => "zlib",
            Self::Zstd => "zstd",
        }
    }

    fn as_cstr(&self) -> *const c_char {
        let name: &'static [u8] = match self {
            Self::BloscLz => b"blosclz\0",
            Self::Lz4 => b"lz4\0",
            Self::Lz4hc => b"lz4hc\0",
            Self::Snappy => b"snappy\0",
            Self::Zlib => b"zlib\0",
            Self::Zstd => b"zstd\0",
        };
        name.as_ptr().cast::<c_char>()
    }
}

/// Shuffle mode as numcodecs writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BloscShuffle {
    /// `-1`: bit shuffle for one-byte elements, byte shuffle otherwise.
    Auto,
    None,
    Byte,
    Bit,
}

impl BloscShuffle {
    fn from_code(code: i64) -> Result<Self> {
        match code {
            -1 => Ok(Self::Auto),
            0 => Ok(Self::None),
            1 => Ok(Self::Byte),
            2 => Ok(Self::Bit),
            other => Err(CodecError::invalid_configuration(format!(
                "unknown blosc shuffle {other}"
            ))),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Auto => -1,
            Self::None => 0,
            Self::Byte => 1,
            Self::Bit => 2,
        }
    }

    fn resolve(&self, typesize: usize) -> c_int {
        match self {
            Self::Auto if typesize == 1 => 2,
            Self::Auto => 1,
            Self::None => 0,
            Self::Byte => 1,
            Self::Bit => 2,
        }
    }
}

/// Resolved blosc settings. `typesize` is the array element size, used when
/// encoding; decoding reads everything it needs from the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloscConfig {
    pub cname: BloscCompressor,
    pub clevel: u8,
    pub shuffle: BloscShuffle,
    pub blocksize: usize,
    pub typesize: usize,
}

impl BloscConfig {
    pub fn from_spec(spec: &CodecSpec, typesize: usize) -> Result<Self> {
        let cname = match spec.get("cname") {
            None | Some(Value::Null) => BloscCompressor::Lz4,
            Some(Value::String(s)) => BloscCompressor::parse(s)?,
            Some(v) => {
                return Err(CodecError::invalid_configuration(format!(
                    "blosc cname must be a string, got {v}"
                )))
            }
        };
        let clevel = int_field(spec, "clevel", 5)?;
        if !(0..=9).contains(&clevel) {
            return Err(CodecError::invalid_configuration(format!(
                "blosc clevel {clevel} outside 0..=9"
            )));
        }
        let shuffle = BloscShuffle::from_code(int_field(spec, "shuffle", 1)?)?;
        let blocksize = int_field(spec, "blocksize", 0)?;
        if blocksize < 0 {
            return Err(CodecError::invalid_configuration(format!(
                "negative blosc blocksize {blocksize}"
            )));
        }

        // cname values compiled out of the linked library are reported here
        let support = unsafe {
            blosc_get_complib_info(cname.as_cstr(), std::ptr::null_mut(), std::ptr::null_mut())
        };
        if support < 0 {
            return Err(CodecError::invalid_configuration(format!(
                "blosc cname {} is not available",
                cname.name()
            )));
        }

        Ok(Self {
            cname,
            clevel: clevel as u8,
            shuffle,
            blocksize: blocksize as usize,
            typesize: typesize.max(1),
        })
    }

    pub fn to_spec(&self) -> CodecSpec {
        CodecSpec::new("blosc")
            .with("cname", self.cname.name())
            .with("clevel", self.clevel)
            .with("shuffle", self.shuffle.code())
            .with("blocksize", self.blocksize)
    }

    pub fn encode(&self, src: &[u8]) -> Result<Vec<u8>> {
        let destsize = src.len() + BLOSC_MAX_OVERHEAD as usize;
        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let written = unsafe {
            blosc_compress_ctx(
                c_int::from(self.clevel),
                self.shuffle.resolve(self.typesize),
                self.typesize,
                src.len(),
                src.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                self.cname.as_cstr(),
                self.blocksize,
                1,
            )
        };
        if written <= 0 {
            return Err(CodecError::CompressionError(format!(
                "blosc: compressor returned {written}"
            )));
        }
        // SAFETY: blosc wrote `written` bytes, bounded by the capacity passed in
        unsafe { dest.set_len(written as usize) };
        Ok(dest)
    }

    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        decode(encoded)
    }
}

fn int_field(spec: &CodecSpec, key: &str, default: i64) -> Result<i64> {
    match spec.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v.as_i64().ok_or_else(|| {
            CodecError::invalid_configuration(format!("blosc {key} must be an integer, got {v}"))
        }),
    }
}

/// Decompress one blosc frame.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
    let mut destsize: usize = 0;
    let valid = unsafe {
        blosc_cbuffer_validate(
            encoded.as_ptr().cast::<c_void>(),
            encoded.len(),
            std::ptr::addr_of_mut!(destsize),
        )
    } == 0;
    if !valid {
        return Err(CodecError::DecompressionError(
            "blosc: invalid frame header".to_string(),
        ));
    }
    if destsize == 0 {
        return Ok(Vec::new());
    }

    let mut dest: Vec<u8> = Vec::with_capacity(destsize);
    let written = unsafe {
        blosc_decompress_ctx(
            encoded.as_ptr().cast::<c_void>(),
            dest.as_mut_ptr().cast::<c_void>(),
            destsize,
            1,
        )
    };
    if written <= 0 || written as usize > destsize {
        return Err(CodecError::DecompressionError(format!(
            "blosc: decompressor returned {written}"
        )));
    }
    // SAFETY: blosc wrote `written` bytes, bounded by `destsize`
    unsafe { dest.set_len(written as usize) };
    Ok(dest)
}
