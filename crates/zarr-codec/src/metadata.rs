//! Zarr v2 array descriptor (`.zarray`) and the pieces it is built from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dtype::{DataType, ElementKind};
use crate::error::{CodecError, Result};

/// Compressor or filter entry: an `id` plus flattened configuration.
///
/// ```json
/// { "id": "zlib", "level": 5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecSpec {
    pub id: String,
    #[serde(flatten)]
    pub configuration: Map<String, Value>,
}

impl CodecSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            configuration: Map::new(),
        }
    }

    /// Add a configuration field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.configuration.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.configuration.get(key)
    }
}

/// Element layout inside each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryOrder {
    /// Row-major, last index varies fastest.
    #[default]
    #[serde(rename = "C")]
    RowMajor,
    /// Column-major, first index varies fastest.
    #[serde(rename = "F")]
    ColumnMajor,
}

/// Fill value used for chunks that were never written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl FillValue {
    /// Interpret a `.zarray` `fill_value` for the given dtype.
    ///
    /// `null` means "no fill value" and materializes as zero.
    pub fn from_json(value: &Value, dtype: &DataType) -> Result<Self> {
        let bad = || CodecError::invalid_metadata(format!("invalid fill_value {value} for {dtype}"));

        let fill = match (value, dtype.kind()) {
            (Value::Null, ElementKind::Bool) => Self::Bool(false),
            (Value::Null, ElementKind::Int) => Self::Int(0),
            (Value::Null, ElementKind::UInt) => Self::UInt(0),
            (Value::Null, ElementKind::Float) => Self::Float(0.0),
            (Value::Bool(b), ElementKind::Bool) => Self::Bool(*b),
            (Value::Number(n), ElementKind::Bool) => Self::Bool(n.as_f64().ok_or_else(bad)? != 0.0),
            (Value::Number(n), ElementKind::Int) => Self::Int(n.as_i64().ok_or_else(bad)?),
            (Value::Number(n), ElementKind::UInt) => Self::UInt(n.as_u64().ok_or_else(bad)?),
            (Value::Number(n), ElementKind::Float) => Self::Float(n.as_f64().ok_or_else(bad)?),
            (Value::String(s), ElementKind::Float) => match s.as_str() {
                "NaN" => Self::Float(f64::NAN),
                "Infinity" => Self::Float(f64::INFINITY),
                "-Infinity" => Self::Float(f64::NEG_INFINITY),
                _ => return Err(bad()),
            },
            _ => return Err(bad()),
        };
        Ok(fill)
    }
}

fn default_zarr_format() -> u8 {
    2
}

/// Array descriptor as stored in `.zarray`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    #[serde(default = "default_zarr_format")]
    pub zarr_format: u8,
    /// Extent of each dimension.
    pub shape: Vec<u64>,
    /// Chunk extent of each dimension.
    pub chunks: Vec<u64>,
    pub dtype: String,
    #[serde(default)]
    pub compressor: Option<CodecSpec>,
    #[serde(default)]
    pub filters: Option<Vec<CodecSpec>>,
    #[serde(default)]
    pub fill_value: Value,
    #[serde(default)]
    pub order: MemoryOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_separator: Option<String>,
}

impl ArrayMetadata {
    /// Minimal uncompressed, row-major descriptor.
    pub fn new(shape: Vec<u64>, chunks: Vec<u64>, dtype: impl Into<String>) -> Self {
        Self {
            zarr_format: 2,
            shape,
            chunks,
            dtype: dtype.into(),
            compressor: None,
            filters: None,
            fill_value: Value::Null,
            order: MemoryOrder::RowMajor,
            dimension_separator: None,
        }
    }

    pub fn with_compressor(mut self, compressor: CodecSpec) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn with_filters(mut self, filters: Vec<CodecSpec>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_fill_value(mut self, fill_value: Value) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn with_order(mut self, order: MemoryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_dimension_separator(mut self, separator: &str) -> Self {
        self.dimension_separator = Some(separator.to_string());
        self
    }

    /// Check shape/chunk consistency.
    pub fn validate(&self) -> Result<()> {
        if self.shape.len() != self.chunks.len() {
            return Err(CodecError::invalid_metadata(format!(
                "shape {:?} and chunks {:?} have different dimensionality",
                self.shape, self.chunks
            )));
        }
        if self.chunks.iter().any(|&c| c == 0) {
            return Err(CodecError::invalid_metadata(format!(
                "chunk shape {:?} contains a zero extent",
                self.chunks
            )));
        }
        match self.dimension_separator.as_deref() {
            None | Some(".") | Some("/") => Ok(()),
            Some(other) => Err(CodecError::invalid_metadata(format!(
                "unsupported dimension_separator {other:?}"
            ))),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn data_type(&self) -> Result<DataType> {
        DataType::parse(&self.dtype)
    }

    pub fn fill(&self) -> Result<FillValue> {
        FillValue::from_json(&self.fill_value, &self.data_type()?)
    }

    /// Separator joining chunk coordinates in a chunk key.
    pub fn separator(&self) -> &str {
        self.dimension_separator.as_deref().unwrap_or(".")
    }

    /// Number of chunks along each dimension.
    pub fn chunk_grid_shape(&self) -> Vec<u64> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(&s, &c)| s.div_ceil(c))
            .collect()
    }

    /// Chunk key relative to the array path; zero-dimensional arrays use `0`.
    pub fn chunk_key(&self, coords: &[u64]) -> String {
        if coords.is_empty() {
            return "0".to_string();
        }
        coords
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(self.separator())
    }

    /// Parse a chunk key back into coordinates.
    pub fn parse_chunk_key(&self, key: &str) -> Option<Vec<u64>> {
        if self.ndim() == 0 {
            return (key == "0").then(Vec::new);
        }
        let coords = key
            .split(self.separator())
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        (coords.len() == self.ndim()).then_some(coords)
    }

    /// Extent of a chunk trimmed at the array boundary.
    pub fn chunk_extent(&self, coords: &[u64]) -> Vec<u64> {
        coords
            .iter()
            .zip(self.shape.iter().zip(&self.chunks))
            .map(|(&c, (&s, &cs))| cs.min(s.saturating_sub(c * cs)))
            .collect()
    }

    /// Element count of a full (untrimmed) chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunks.iter().product::<u64>() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_zarray() {
        let meta: ArrayMetadata = serde_json::from_value(json!({
            "zarr_format": 2,
            "shape": [100, 4],
            "chunks": [10, 4],
            "dtype": "<f4",
            "compressor": {"id": "zlib", "level": 1},
            "filters": null,
            "fill_value": "NaN",
            "order": "C"
        }))
        .unwrap();

        assert_eq!(meta.shape, vec![100, 4]);
        assert_eq!(meta.compressor.as_ref().unwrap().id, "zlib");
        assert_eq!(meta.compressor.as_ref().unwrap().get("level"), Some(&json!(1)));
        assert_eq!(meta.order, MemoryOrder::RowMajor);
        assert!(matches!(meta.fill().unwrap(), FillValue::Float(v) if v.is_nan()));
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_chunk_grid_and_extent() {
        let meta = ArrayMetadata::new(vec![25, 7], vec![10, 4], "<i2");
        assert_eq!(meta.chunk_grid_shape(), vec![3, 2]);
        assert_eq!(meta.chunk_extent(&[0, 0]), vec![10, 4]);
        assert_eq!(meta.chunk_extent(&[2, 1]), vec![5, 3]);
        assert_eq!(meta.chunk_len(), 40);
    }

    #[test]
    fn test_chunk_keys() {
        let meta = ArrayMetadata::new(vec![25, 7], vec![10, 4], "<i2");
        assert_eq!(meta.chunk_key(&[2, 1]), "2.1");
        assert_eq!(meta.parse_chunk_key("2.1"), Some(vec![2, 1]));
        assert_eq!(meta.parse_chunk_key("2"), None);

        let nested = meta.clone().with_dimension_separator("/");
        assert_eq!(nested.chunk_key(&[2, 1]), "2/1");
        assert_eq!(nested.parse_chunk_key("2/1"), Some(vec![2, 1]));

        let scalar = ArrayMetadata::new(vec![], vec![], "<f8");
        assert_eq!(scalar.chunk_key(&[]), "0");
        assert_eq!(scalar.parse_chunk_key("0"), Some(vec![]));
    }

    #[test]
    fn test_validate_rejects_mismatched_dims() {
        let meta = ArrayMetadata::new(vec![25, 7], vec![10], "<i2");
        assert!(meta.validate().is_err());
        let meta = ArrayMetadata::new(vec![25], vec![0], "<i2");
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_fill_values() {
        let f4 = DataType::parse("<f4").unwrap();
        let u1 = DataType::parse("|u1").unwrap();
        assert_eq!(FillValue::from_json(&Value::Null, &u1).unwrap(), FillValue::UInt(0));
        assert_eq!(
            FillValue::from_json(&json!("-Infinity"), &f4).unwrap(),
            FillValue::Float(f64::NEG_INFINITY)
        );
        assert_eq!(FillValue::from_json(&json!(7), &u1).unwrap(), FillValue::UInt(7));
        assert!(FillValue::from_json(&json!(-1), &u1).is_err());
        assert!(FillValue::from_json(&json!("abc"), &f4).is_err());
    }
}
