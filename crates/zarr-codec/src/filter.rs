//! Filters applied between the typed buffer and the compressor.

use crate::data::ArrayData;
use crate::dtype::DataType;
use crate::error::{CodecError, Result};
use crate::metadata::CodecSpec;

/// Supported filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Byte transposition grouping the n-th byte of every element together.
    Shuffle { elementsize: usize },
    /// Differences between consecutive elements.
    Delta { dtype: DataType },
}

impl Filter {
    /// Build a filter from its metadata entry. `array_dtype` supplies defaults.
    pub fn from_spec(spec: &CodecSpec, array_dtype: &DataType) -> Result<Self> {
        match spec.id.as_str() {
            "shuffle" => {
                let elementsize = match spec.get("elementsize") {
                    None => array_dtype.size(),
                    Some(v) => v.as_u64().filter(|&n| n > 0).ok_or_else(|| {
                        CodecError::invalid_configuration(format!("shuffle elementsize {v}"))
                    })? as usize,
                };
                Ok(Self::Shuffle { elementsize })
            }
            "delta" => {
                let dtype = match spec.get("dtype").and_then(|v| v.as_str()) {
                    Some(s) => DataType::parse(s)?,
                    None => *array_dtype,
                };
                if let Some(astype) = spec.get("astype").and_then(|v| v.as_str()) {
                    if DataType::parse(astype)? != dtype {
                        return Err(CodecError::UnsupportedFilter(format!(
                            "delta with astype {astype} different from dtype {dtype}"
                        )));
                    }
                }
                if dtype.size() != array_dtype.size() {
                    return Err(CodecError::invalid_configuration(format!(
                        "delta dtype {dtype} does not match array dtype {array_dtype}"
                    )));
                }
                Ok(Self::Delta { dtype })
            }
            other => Err(CodecError::UnsupportedFilter(other.to_string())),
        }
    }

    /// Metadata entry describing this filter.
    pub fn to_spec(&self) -> CodecSpec {
        match self {
            Self::Shuffle { elementsize } => CodecSpec::new("shuffle").with("elementsize", *elementsize),
            Self::Delta { dtype } => CodecSpec::new("delta")
                .with("dtype", dtype.to_string())
                .with("astype", dtype.to_string()),
        }
    }

    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        match *self {
            Self::Shuffle { elementsize } => {
                check_multiple(encoded.len(), elementsize)?;
                let count = encoded.len() / elementsize;
                let mut out = vec![0u8; encoded.len()];
                for i in 0..elementsize {
                    let offset = i * count;
                    for byte_index in 0..count {
                        out[byte_index * elementsize + i] = encoded[offset + byte_index];
                    }
                }
                Ok(out)
            }
            Self::Delta { dtype } => {
                let data = ArrayData::from_bytes(encoded, &dtype)?;
                Ok(cumulative_sum(data).to_bytes(dtype.byte_order()))
            }
        }
    }

    pub fn encode(&self, decoded: &[u8]) -> Result<Vec<u8>> {
        match *self {
            Self::Shuffle { elementsize } => {
                check_multiple(decoded.len(), elementsize)?;
                let count = decoded.len() / elementsize;
                let mut out = vec![0u8; decoded.len()];
                for i in 0..count {
                    let offset = i * elementsize;
                    for byte_index in 0..elementsize {
                        out[byte_index * count + i] = decoded[offset + byte_index];
                    }
                }
                Ok(out)
            }
            Self::Delta { dtype } => {
                let data = ArrayData::from_bytes(decoded, &dtype)?;
                Ok(differences(data).to_bytes(dtype.byte_order()))
            }
        }
    }
}

fn check_multiple(len: usize, elementsize: usize) -> Result<()> {
    if len % elementsize != 0 {
        return Err(CodecError::LengthMismatch {
            expected: vec![len - len % elementsize],
            actual: len,
        });
    }
    Ok(())
}

macro_rules! scan {
    ($v:expr, $op:ident, cumulative) => {{
        let mut acc = Default::default();
        for x in $v.iter_mut() {
            acc = $op(acc, *x);
            *x = acc;
        }
    }};
    ($v:expr, $op:ident, difference) => {{
        let mut prev = Default::default();
        for x in $v.iter_mut() {
            let cur = *x;
            *x = $op(cur, prev);
            prev = cur;
        }
    }};
}

fn cumulative_sum(mut data: ArrayData) -> ArrayData {
    fn add<T: WrappingOps>(a: T, b: T) -> T {
        a.wrapping_add_(b)
    }
    match &mut data {
        ArrayData::Bool(_) => {}
        ArrayData::Int8(v) => scan!(v, add, cumulative),
        ArrayData::Int16(v) => scan!(v, add, cumulative),
        ArrayData::Int32(v) => scan!(v, add, cumulative),
        ArrayData::Int64(v) => scan!(v, add, cumulative),
        ArrayData::UInt8(v) => scan!(v, add, cumulative),
        ArrayData::UInt16(v) => scan!(v, add, cumulative),
        ArrayData::UInt32(v) => scan!(v, add, cumulative),
        ArrayData::UInt64(v) => scan!(v, add, cumulative),
        ArrayData::Float32(v) => scan!(v, add, cumulative),
        ArrayData::Float64(v) => scan!(v, add, cumulative),
    }
    data
}

fn differences(mut data: ArrayData) -> ArrayData {
    fn sub<T: WrappingOps>(a: T, b: T) -> T {
        a.wrapping_sub_(b)
    }
    match &mut data {
        ArrayData::Bool(_) => {}
        ArrayData::Int8(v) => scan!(v, sub, difference),
        ArrayData::Int16(v) => scan!(v, sub, difference),
        ArrayData::Int32(v) => scan!(v, sub, difference),
        ArrayData::Int64(v) => scan!(v, sub, difference),
        ArrayData::UInt8(v) => scan!(v, sub, difference),
        ArrayData::UInt16(v) => scan!(v, sub, difference),
        ArrayData::UInt32(v) => scan!(v, sub, difference),
        ArrayData::UInt64(v) => scan!(v, sub, difference),
        ArrayData::Float32(v) => scan!(v, sub, difference),
        ArrayData::Float64(v) => scan!(v, sub, difference),
    }
    data
}

/// Overflow-wrapping arithmetic for integers, plain arithmetic for floats.
trait WrappingOps: Copy + Default {
    fn wrapping_add_(self, other: Self) -> Self;
    fn wrapping_sub_(self, other: Self) -> Self;
}

macro_rules! impl_wrapping_int {
    ($($t:ty),*) => {$(
        impl WrappingOps for $t {
            fn wrapping_add_(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
            fn wrapping_sub_(self, other: Self) -> Self {
                self.wrapping_sub(other)
            }
        }
    )*};
}

macro_rules! impl_wrapping_float {
    ($($t:ty),*) => {$(
        impl WrappingOps for $t {
            fn wrapping_add_(self, other: Self) -> Self {
                self + other
            }
            fn wrapping_sub_(self, other: Self) -> Self {
                self - other
            }
        }
    )*};
}

impl_wrapping_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_wrapping_float!(f32, f64);
