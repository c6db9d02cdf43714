//! Typed element buffers.

use crate::dtype::{ByteOrder, DataType, ElementKind};
use crate::error::{CodecError, Result};
use crate::metadata::FillValue;

/// A contiguous buffer of decoded elements, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Apply `$body` to the inner vector of any variant.
macro_rules! with_vec {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($v) => $body,
            ArrayData::Int8($v) => $body,
            ArrayData::Int16($v) => $body,
            ArrayData::Int32($v) => $body,
            ArrayData::Int64($v) => $body,
            ArrayData::UInt8($v) => $body,
            ArrayData::UInt16($v) => $body,
            ArrayData::UInt32($v) => $body,
            ArrayData::UInt64($v) => $body,
            ArrayData::Float32($v) => $body,
            ArrayData::Float64($v) => $body,
        }
    };
}

/// Apply `$body` to matching inner vectors of two buffers of the same variant.
macro_rules! with_pair {
    ($a:expr, $b:expr, ($x:ident, $y:ident) => $body:expr, $mismatch:expr) => {
        match ($a, $b) {
            (ArrayData::Bool($x), ArrayData::Bool($y)) => $body,
            (ArrayData::Int8($x), ArrayData::Int8($y)) => $body,
            (ArrayData::Int16($x), ArrayData::Int16($y)) => $body,
            (ArrayData::Int32($x), ArrayData::Int32($y)) => $body,
            (ArrayData::Int64($x), ArrayData::Int64($y)) => $body,
            (ArrayData::UInt8($x), ArrayData::UInt8($y)) => $body,
            (ArrayData::UInt16($x), ArrayData::UInt16($y)) => $body,
            (ArrayData::UInt32($x), ArrayData::UInt32($y)) => $body,
            (ArrayData::UInt64($x), ArrayData::UInt64($y)) => $body,
            (ArrayData::Float32($x), ArrayData::Float32($y)) => $body,
            (ArrayData::Float64($x), ArrayData::Float64($y)) => $body,
            _ => $mismatch,
        }
    };
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

macro_rules! decode_numbers {
    ($bytes:expr, $order:expr, $t:ty, $n:literal) => {{
        let big = $order.is_big();
        $bytes
            .chunks_exact($n)
            .map(|c| {
                if big {
                    <$t>::from_be_bytes(fixed::<$n>(c))
                } else {
                    <$t>::from_le_bytes(fixed::<$n>(c))
                }
            })
            .collect::<Vec<$t>>()
    }};
}

macro_rules! encode_numbers {
    ($values:expr, $order:expr) => {{
        let big = $order.is_big();
        let mut out = Vec::new();
        for v in $values {
            if big {
                out.extend_from_slice(&v.to_be_bytes());
            } else {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out
    }};
}

impl ArrayData {
    /// Interpret raw bytes as elements of `dtype`.
    pub fn from_bytes(bytes: &[u8], dtype: &DataType) -> Result<Self> {
        if bytes.len() % dtype.size() != 0 {
            return Err(CodecError::LengthMismatch {
                expected: vec![bytes.len() - bytes.len() % dtype.size()],
                actual: bytes.len(),
            });
        }
        let order = dtype.byte_order();
        let data = match (dtype.kind(), dtype.size()) {
            (ElementKind::Bool, 1) => Self::Bool(bytes.iter().map(|&b| b != 0).collect()),
            (ElementKind::Int, 1) => Self::Int8(bytes.iter().map(|&b| b as i8).collect()),
            (ElementKind::Int, 2) => Self::Int16(decode_numbers!(bytes, order, i16, 2)),
            (ElementKind::Int, 4) => Self::Int32(decode_numbers!(bytes, order, i32, 4)),
            (ElementKind::Int, 8) => Self::Int64(decode_numbers!(bytes, order, i64, 8)),
            (ElementKind::UInt, 1) => Self::UInt8(bytes.to_vec()),
            (ElementKind::UInt, 2) => Self::UInt16(decode_numbers!(bytes, order, u16, 2)),
            (ElementKind::UInt, 4) => Self::UInt32(decode_numbers!(bytes, order, u32, 4)),
            (ElementKind::UInt, 8) => Self::UInt64(decode_numbers!(bytes, order, u64, 8)),
            (ElementKind::Float, 4) => Self::Float32(decode_numbers!(bytes, order, f32, 4)),
            (ElementKind::Float, 8) => Self::Float64(decode_numbers!(bytes, order, f64, 8)),
            _ => return Err(CodecError::UnsupportedDtype(dtype.to_string())),
        };
        Ok(data)
    }

    /// Serialize elements with the given byte order.
    pub fn to_bytes(&self, order: ByteOrder) -> Vec<u8> {
        match self {
            Self::Bool(v) => v.iter().map(|&b| b as u8).collect(),
            Self::Int8(v) => v.iter().map(|&b| b as u8).collect(),
            Self::UInt8(v) => v.clone(),
            Self::Int16(v) => encode_numbers!(v, order),
            Self::Int32(v) => encode_numbers!(v, order),
            Self::Int64(v) => encode_numbers!(v, order),
            Self::UInt16(v) => encode_numbers!(v, order),
            Self::UInt32(v) => encode_numbers!(v, order),
            Self::UInt64(v) => encode_numbers!(v, order),
            Self::Float32(v) => encode_numbers!(v, order),
            Self::Float64(v) => encode_numbers!(v, order),
        }
    }

    /// A buffer of `len` copies of `fill`, typed by `dtype`.
    pub fn filled(dtype: &DataType, fill: FillValue, len: usize) -> Result<Self> {
        let as_f64 = match fill {
            FillValue::Bool(b) => b as u8 as f64,
            FillValue::Int(i) => i as f64,
            FillValue::UInt(u) => u as f64,
            FillValue::Float(f) => f,
        };
        let as_i64 = match fill {
            FillValue::Bool(b) => b as i64,
            FillValue::Int(i) => i,
            FillValue::UInt(u) => u as i64,
            FillValue::Float(f) => f as i64,
        };
        let as_u64 = match fill {
            FillValue::Bool(b) => b as u64,
            FillValue::Int(i) => i as u64,
            FillValue::UInt(u) => u,
            FillValue::Float(f) => f as u64,
        };
        let data = match (dtype.kind(), dtype.size()) {
            (ElementKind::Bool, _) => Self::Bool(vec![as_u64 != 0; len]),
            (ElementKind::Int, 1) => Self::Int8(vec![as_i64 as i8; len]),
            (ElementKind::Int, 2) => Self::Int16(vec![as_i64 as i16; len]),
            (ElementKind::Int, 4) => Self::Int32(vec![as_i64 as i32; len]),
            (ElementKind::Int, 8) => Self::Int64(vec![as_i64; len]),
            (ElementKind::UInt, 1) => Self::UInt8(vec![as_u64 as u8; len]),
            (ElementKind::UInt, 2) => Self::UInt16(vec![as_u64 as u16; len]),
            (ElementKind::UInt, 4) => Self::UInt32(vec![as_u64 as u32; len]),
            (ElementKind::UInt, 8) => Self::UInt64(vec![as_u64; len]),
            (ElementKind::Float, 4) => Self::Float32(vec![as_f64 as f32; len]),
            (ElementKind::Float, 8) => Self::Float64(vec![as_f64; len]),
            _ => return Err(CodecError::UnsupportedDtype(dtype.to_string())),
        };
        Ok(data)
    }

    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short element type name, for logs and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt8(_) => "uint8",
            Self::UInt16(_) => "uint16",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
        }
    }

    /// Copy `count` elements of `src`, starting at `src_start` and advancing by
    /// `src_step`, into consecutive positions of `self` starting at `dst_start`.
    pub fn copy_strided(
        &mut self,
        dst_start: usize,
        src: &ArrayData,
        src_start: usize,
        src_step: usize,
        count: usize,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let dst_len = self.len();
        let src_len = src.len();
        let src_last = src_start + (count - 1) * src_step;
        if dst_start + count > dst_len || src_last >= src_len {
            return Err(CodecError::LengthMismatch {
                expected: vec![dst_start + count, src_last + 1],
                actual: dst_len.min(src_len),
            });
        }
        let (dst_name, src_name) = (self.type_name(), src.type_name());
        with_pair!(self, src, (dst, s) => {
            if src_step == 1 {
                dst[dst_start..dst_start + count].copy_from_slice(&s[src_start..src_start + count]);
            } else {
                for (i, slot) in dst[dst_start..dst_start + count].iter_mut().enumerate() {
                    *slot = s[src_start + i * src_step];
                }
            }
            Ok(())
        }, Err(CodecError::TypeMismatch(format!("cannot copy {src_name} into {dst_name}"))))
    }

    /// Build a new buffer by picking elements; `None` picks `fill`.
    ///
    /// Used to cut a full array into padded chunk buffers.
    pub fn gather(&self, indices: &[Option<usize>], fill: FillValue) -> Result<Self> {
        let mut out = self.empty_like(indices.len());
        let fill_one = self.fill_one(fill);
        for index in indices {
            match index {
                Some(i) if *i < self.len() => out.push_from(self, *i)?,
                Some(i) => {
                    return Err(CodecError::LengthMismatch {
                        expected: vec![i + 1],
                        actual: self.len(),
                    })
                }
                None => out.push_from(&fill_one, 0)?,
            }
        }
        Ok(out)
    }

    fn empty_like(&self, capacity: usize) -> Self {
        match self {
            Self::Bool(_) => Self::Bool(Vec::with_capacity(capacity)),
            Self::Int8(_) => Self::Int8(Vec::with_capacity(capacity)),
            Self::Int16(_) => Self::Int16(Vec::with_capacity(capacity)),
            Self::Int32(_) => Self::Int32(Vec::with_capacity(capacity)),
            Self::Int64(_) => Self::Int64(Vec::with_capacity(capacity)),
            Self::UInt8(_) => Self::UInt8(Vec::with_capacity(capacity)),
            Self::UInt16(_) => Self::UInt16(Vec::with_capacity(capacity)),
            Self::UInt32(_) => Self::UInt32(Vec::with_capacity(capacity)),
            Self::UInt64(_) => Self::UInt64(Vec::with_capacity(capacity)),
            Self::Float32(_) => Self::Float32(Vec::with_capacity(capacity)),
            Self::Float64(_) => Self::Float64(Vec::with_capacity(capacity)),
        }
    }

    fn fill_one(&self, fill: FillValue) -> Self {
        let mut one = self.empty_like(1);
        let (i, u, f, b) = match fill {
            FillValue::Bool(b) => (b as i64, b as u64, b as u8 as f64, b),
            FillValue::Int(i) => (i, i as u64, i as f64, i != 0),
            FillValue::UInt(u) => (u as i64, u, u as f64, u != 0),
            FillValue::Float(f) => (f as i64, f as u64, f, f != 0.0),
        };
        match &mut one {
            Self::Bool(v) => v.push(b),
            Self::Int8(v) => v.push(i as i8),
            Self::Int16(v) => v.push(i as i16),
            Self::Int32(v) => v.push(i as i32),
            Self::Int64(v) => v.push(i),
            Self::UInt8(v) => v.push(u as u8),
            Self::UInt16(v) => v.push(u as u16),
            Self::UInt32(v) => v.push(u as u32),
            Self::UInt64(v) => v.push(u),
            Self::Float32(v) => v.push(f as f32),
            Self::Float64(v) => v.push(f),
        }
        one
    }

    fn push_from(&mut self, src: &ArrayData, index: usize) -> Result<()> {
        let (dst_name, src_name) = (self.type_name(), src.type_name());
        with_pair!(self, src, (dst, s) => {
            dst.push(s[index]);
            Ok(())
        }, Err(CodecError::TypeMismatch(format!("cannot copy {src_name} into {dst_name}"))))
    }

    /// Element at `index` as a scalar.
    pub fn scalar_at(&self, index: usize) -> Option<Scalar> {
        let scalar = match self {
            Self::Bool(v) => Scalar::Bool(*v.get(index)?),
            Self::Int8(v) => Scalar::Int(*v.get(index)? as i64),
            Self::Int16(v) => Scalar::Int(*v.get(index)? as i64),
            Self::Int32(v) => Scalar::Int(*v.get(index)? as i64),
            Self::Int64(v) => Scalar::Int(*v.get(index)?),
            Self::UInt8(v) => Scalar::UInt(*v.get(index)? as u64),
            Self::UInt16(v) => Scalar::UInt(*v.get(index)? as u64),
            Self::UInt32(v) => Scalar::UInt(*v.get(index)? as u64),
            Self::UInt64(v) => Scalar::UInt(*v.get(index)?),
            Self::Float32(v) => Scalar::Float(*v.get(index)? as f64),
            Self::Float64(v) => Scalar::Float(*v.get(index)?),
        };
        Some(scalar)
    }

    /// Lossy conversion of every element to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len())
            .filter_map(|i| self.scalar_at(i))
            .map(|s| s.as_f64())
            .collect()
    }
}

/// A single element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Bool(b) => b as u8 as f64,
            Self::Int(i) => i as f64,
            Self::UInt(u) => u as f64,
            Self::Float(f) => f,
        }
    }
}

/// Result of reading a dataset: an n-dimensional buffer or a bare scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetData {
    /// Row-major buffer with its shape.
    Array { data: ArrayData, shape: Vec<u64> },
    Scalar(Scalar),
}

impl DatasetData {
    /// Wrap a decoded buffer, unwrapping single elements of datasets that
    /// carry the scalar marker attribute.
    pub fn from_array(data: ArrayData, shape: Vec<u64>, scalar_marker: bool) -> Self {
        if scalar_marker && data.len() == 1 {
            if let Some(scalar) = data.scalar_at(0) {
                return Self::Scalar(scalar);
            }
        }
        Self::Array { data, shape }
    }

    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            Self::Array { data, .. } => Some(data),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Self::Scalar(s) => Some(*s),
            Self::Array { .. } => None,
        }
    }

    pub fn shape(&self) -> &[u64] {
        match self {
            Self::Array { shape, .. } => shape,
            Self::Scalar(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_respects_byte_order() {
        let le = DataType::parse("<i2").unwrap();
        let be = DataType::parse(">i2").unwrap();
        let bytes = [0x01, 0x02, 0xff, 0xff];
        assert_eq!(ArrayData::from_bytes(&bytes, &le).unwrap(), ArrayData::Int16(vec![0x0201, -1]));
        assert_eq!(ArrayData::from_bytes(&bytes, &be).unwrap(), ArrayData::Int16(vec![0x0102, -1]));
    }

    #[test]
    fn test_to_bytes_inverts_from_bytes() {
        let dt = DataType::parse(">f8").unwrap();
        let data = ArrayData::Float64(vec![1.5, -2.25, f64::INFINITY]);
        let bytes = data.to_bytes(dt.byte_order());
        assert_eq!(bytes.len(), 24);
        assert_eq!(ArrayData::from_bytes(&bytes, &dt).unwrap(), data);
    }

    #[test]
    fn test_from_bytes_rejects_partial_element() {
        let dt = DataType::parse("<f4").unwrap();
        assert!(matches!(
            ArrayData::from_bytes(&[0, 0, 0, 0, 0], &dt),
            Err(CodecError::LengthMismatch { actual: 5, .. })
        ));
    }

    #[test]
    fn test_filled() {
        let dt = DataType::parse("<f4").unwrap();
        let data = ArrayData::filled(&dt, FillValue::Float(f64::NAN), 3).unwrap();
        match data {
            ArrayData::Float32(v) => assert!(v.iter().all(|x| x.is_nan())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_copy_strided() {
        let mut dst = ArrayData::UInt16(vec![0; 6]);
        let src = ArrayData::UInt16(vec![10, 11, 12, 13, 14, 15, 16, 17]);
        dst.copy_strided(1, &src, 2, 1, 3).unwrap();
        assert_eq!(dst, ArrayData::UInt16(vec![0, 12, 13, 14, 0, 0]));
        dst.copy_strided(4, &src, 1, 3, 2).unwrap();
        assert_eq!(dst, ArrayData::UInt16(vec![0, 12, 13, 14, 11, 14]));
    }

    #[test]
    fn test_copy_strided_checks_types_and_bounds() {
        let mut dst = ArrayData::UInt16(vec![0; 2]);
        let src = ArrayData::Int16(vec![1, 2]);
        assert!(matches!(
            dst.copy_strided(0, &src, 0, 1, 2),
            Err(CodecError::TypeMismatch(_))
        ));
        let src = ArrayData::UInt16(vec![1, 2]);
        assert!(dst.copy_strided(1, &src, 0, 1, 2).is_err());
    }

    #[test]
    fn test_gather_with_fill() {
        let src = ArrayData::Int32(vec![5, 6, 7]);
        let out = src.gather(&[Some(2), None, Some(0)], FillValue::Int(-1)).unwrap();
        assert_eq!(out, ArrayData::Int32(vec![7, -1, 5]));
    }

    #[test]
    fn test_scalar_unwrap_requires_marker() {
        let one = ArrayData::Float32(vec![2.5]);
        assert_eq!(
            DatasetData::from_array(one.clone(), vec![1], true),
            DatasetData::Scalar(Scalar::Float(2.5))
        );
        assert_eq!(
            DatasetData::from_array(one.clone(), vec![1], false),
            DatasetData::Array { data: one, shape: vec![1] }
        );
        let two = ArrayData::Float32(vec![1.0, 2.0]);
        assert!(DatasetData::from_array(two, vec![2], true).as_array().is_some());
    }
}
