//! Human-readable output.

use serde::Serialize;
use zarr_codec::DatasetData;
use zarr_remote::{Attributes, Group};

/// Values shown in a data summary.
const HEAD_LEN: usize = 8;

/// Indented listing of a group and everything below it.
pub fn tree(group: &Group<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    walk(group, 0, &mut lines);
    lines
}

fn walk(group: &Group<'_>, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    lines.push(format!("{indent}{}{}", group.path(), attr_note(group.attrs())));

    for dataset in group.datasets() {
        lines.push(format!(
            "{indent}  {} {:?} {}{}",
            dataset.name,
            dataset.shape,
            dataset.dtype,
            attr_note(&dataset.attrs)
        ));
    }
    for info in group.subgroups() {
        if let Some(child) = group.get_group(&info.name) {
            walk(&child, depth + 1, lines);
        }
    }
}

fn attr_note(attrs: &Attributes) -> String {
    match attrs.len() {
        0 => String::new(),
        1 => "  (1 attribute)".to_string(),
        n => format!("  ({n} attributes)"),
    }
}

/// Statistics of a data read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub shape: Vec<u64>,
    pub len: usize,
    pub scalar: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub head: Vec<f64>,
}

impl DataSummary {
    pub fn of(data: &DatasetData) -> Self {
        let values = match data {
            DatasetData::Array { data, .. } => data.to_f64_vec(),
            DatasetData::Scalar(s) => vec![s.as_f64()],
        };
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let (min, max, mean) = if finite.is_empty() {
            (None, None, None)
        } else {
            let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
            let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = finite.iter().sum::<f64>() / finite.len() as f64;
            (Some(min), Some(max), Some(mean))
        };

        Self {
            shape: data.shape().to_vec(),
            len: values.len(),
            scalar: matches!(data, DatasetData::Scalar(_)),
            min,
            max,
            mean,
            head: values.into_iter().take(HEAD_LEN).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zarr_codec::{ArrayData, Scalar};

    #[test]
    fn test_summary_skips_non_finite() {
        let data = DatasetData::Array {
            data: ArrayData::Float32(vec![1.0, f32::NAN, 3.0]),
            shape: vec![3],
        };
        let summary = DataSummary::of(&data);
        assert_eq!(summary.len, 3);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(3.0));
        assert_eq!(summary.mean, Some(2.0));
        assert!(summary.head[1].is_nan());
    }

    #[test]
    fn test_summary_of_scalar() {
        let summary = DataSummary::of(&DatasetData::Scalar(Scalar::Int(-4)));
        assert!(summary.scalar);
        assert!(summary.shape.is_empty());
        assert_eq!(summary.head, vec![-4.0]);
    }

    #[test]
    fn test_attr_note() {
        let mut attrs = Attributes::new();
        assert_eq!(attr_note(&attrs), "");
        attrs.insert("a".into(), zarr_remote::AttrValue::Null);
        assert_eq!(attr_note(&attrs), "  (1 attribute)");
    }
}
