//! NumPy-style dtype strings (`<f4`, `>i2`, `|u1`, `|b1`).
//!
//! The string alone decides element width, signedness, float-vs-integer and
//! byte order. Nothing here assumes the host's native layout except the
//! explicit `=` prefix.

use std::fmt;
use std::str::FromStr;

use crate::error::{CodecError, Result};

/// Byte order of multi-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
    /// Single-byte elements (`|` prefix).
    NotApplicable,
}

impl ByteOrder {
    /// Byte order of the running platform, used for the `=` prefix.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Whether multi-byte values must be read big-endian.
    pub fn is_big(&self) -> bool {
        matches!(self, Self::Big)
    }

    fn prefix(&self) -> char {
        match self {
            Self::Little => '<',
            Self::Big => '>',
            Self::NotApplicable => '|',
        }
    }
}

/// Element category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bool,
    Int,
    UInt,
    Float,
}

/// A parsed dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    kind: ElementKind,
    size: usize,
    order: ByteOrder,
}

impl DataType {
    /// Parse a dtype string.
    pub fn parse(s: &str) -> Result<Self> {
        let unsupported = || CodecError::UnsupportedDtype(s.to_string());

        let mut chars = s.chars();
        let order = match chars.next() {
            Some('<') => ByteOrder::Little,
            Some('>') => ByteOrder::Big,
            Some('|') => ByteOrder::NotApplicable,
            Some('=') => ByteOrder::native(),
            _ => return Err(unsupported()),
        };
        let kind = match chars.next() {
            Some('b') => ElementKind::Bool,
            Some('i') => ElementKind::Int,
            Some('u') => ElementKind::UInt,
            Some('f') => ElementKind::Float,
            _ => return Err(unsupported()),
        };
        let size: usize = chars.as_str().parse().map_err(|_| unsupported())?;

        let valid_size = match kind {
            ElementKind::Bool => size == 1,
            ElementKind::Int | ElementKind::UInt => matches!(size, 1 | 2 | 4 | 8),
            ElementKind::Float => matches!(size, 4 | 8),
        };
        if !valid_size {
            return Err(unsupported());
        }

        let order = if size == 1 {
            ByteOrder::NotApplicable
        } else if order == ByteOrder::NotApplicable {
            // `|` only makes sense for single-byte elements
            return Err(unsupported());
        } else {
            order
        };

        Ok(Self { kind, size, order })
    }

    /// Element width in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Canonical dtype string for this type.
    pub fn to_dtype_string(&self) -> String {
        let kind = match self.kind {
            ElementKind::Bool => 'b',
            ElementKind::Int => 'i',
            ElementKind::UInt => 'u',
            ElementKind::Float => 'f',
        };
        format!("{}{}{}", self.order.prefix(), kind, self.size)
    }
}

impl FromStr for DataType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dtype_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_types() {
        let dt = DataType::parse("<f4").unwrap();
        assert_eq!(dt.kind(), ElementKind::Float);
        assert_eq!(dt.size(), 4);
        assert_eq!(dt.byte_order(), ByteOrder::Little);

        let dt = DataType::parse(">f8").unwrap();
        assert_eq!(dt.size(), 8);
        assert!(dt.byte_order().is_big());
    }

    #[test]
    fn test_single_byte_types_ignore_order() {
        assert_eq!(
            DataType::parse("|u1").unwrap().byte_order(),
            ByteOrder::NotApplicable
        );
        assert_eq!(
            DataType::parse("<i1").unwrap().byte_order(),
            ByteOrder::NotApplicable
        );
        assert_eq!(DataType::parse("|b1").unwrap().kind(), ElementKind::Bool);
    }

    #[test]
    fn test_rejects_unsupported() {
        for bad in ["", "f4", "<f2", "<c8", "|i4", "<U10", "|S5", "<i3", "<ix"] {
            assert!(
                matches!(DataType::parse(bad), Err(CodecError::UnsupportedDtype(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["<f4", ">i2", "|u1", "<u8", "|b1"] {
            assert_eq!(DataType::parse(s).unwrap().to_string(), s);
        }
    }
}
