//! Metadata flattening for backends that only accept scalar values.
//!
//! Lists and nested mappings become their JSON text; null becomes `""`.

use serde_json::Value;

use crate::types::{FlatMetadata, Metadata, Scalar};

pub fn flatten_value(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Str(String::new()),
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Scalar::Int(i),
            None => Scalar::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Scalar::Str(s.clone()),
        Value::Array(_) | Value::Object(_) => Scalar::Str(value.to_string()),
    }
}

pub fn flatten_metadata(metadata: &Metadata) -> FlatMetadata {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), flatten_value(v)))
        .collect()
}

/// True when every filter entry is present in `metadata` with an equal value.
/// Integer and float encodings of the same number compare equal.
pub fn matches_filters(metadata: &FlatMetadata, filters: &FlatMetadata) -> bool {
    filters.iter().all(|(key, expected)| match (metadata.get(key), expected) {
        (Some(Scalar::Int(a)), Scalar::Float(b)) | (Some(Scalar::Float(b)), Scalar::Int(a)) => {
            (*a as f64 - b).abs() < f64::EPSILON
        }
        (Some(actual), expected) => actual == expected,
        (None, _) => false,
    })
}
