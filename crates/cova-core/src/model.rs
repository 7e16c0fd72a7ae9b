//! Request and response types shared by the gateway operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::ConversionError;

/// A `best` value as the caller sent it.
///
/// Front-ends submit numbers, numeric strings, or blanks. Conversion is
/// deferred to reconciliation so a bad value only fails its own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuppliedValue {
    Number(f64),
    Text(String),
    Other(Value),
}

impl SuppliedValue {
    /// `Ok(None)` means absent: let the engine default apply.
    ///
    /// Zero is a present value.
    pub fn to_number(&self, key: &str) -> Result<Option<f64>, ConversionError> {
        let value = match self {
            SuppliedValue::Number(v) => *v,
            SuppliedValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| ConversionError::NotANumber {
                        key: key.to_string(),
                        raw: s.clone(),
                    })?
            }
            SuppliedValue::Other(Value::Null) => return Ok(None),
            SuppliedValue::Other(other) => {
                return Err(ConversionError::UnsupportedType {
                    key: key.to_string(),
                    found: json_type_name(other),
                })
            }
        };
        if !value.is_finite() {
            return Err(ConversionError::NonFinite {
                key: key.to_string(),
            });
        }
        Ok(Some(value))
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One caller-supplied parameter entry. Fields other than `best` are echoed
/// back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    #[serde(default)]
    pub best: Option<SuppliedValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OverrideEntry {
    pub fn with_best(best: f64) -> Self {
        Self {
            best: Some(SuppliedValue::Number(best)),
            extra: Map::new(),
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    /// Current `best` if it already holds a number.
    pub fn best_number(&self) -> Option<f64> {
        match self.best {
            Some(SuppliedValue::Number(v)) => Some(v),
            _ => None,
        }
    }
}

pub type OverrideGroup = BTreeMap<String, OverrideEntry>;

/// Parameters submitted to `run_sim`; also the shape of an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub sim_pars: OverrideGroup,
    #[serde(default)]
    pub epi_pars: OverrideGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    /// Serialized figure.
    pub json: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBlob {
    pub filename: String,
    /// `data:` URI with base64 payload.
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub days: u64,
    pub cases: i64,
    pub deaths: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Accumulated recoverable errors; empty on full success.
    pub err: String,
    pub sim_pars: OverrideGroup,
    pub epi_pars: OverrideGroup,
    pub graphs: Vec<GraphPayload>,
    pub files: BTreeMap<String, FileBlob>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(v: Value) -> OverrideEntry {
        serde_json::from_value(json!({ "best": v, "name": "x" })).unwrap()
    }

    #[test]
    fn blank_and_null_are_absent() {
        assert_eq!(entry(json!("")).best.unwrap().to_number("k"), Ok(None));
        assert_eq!(entry(json!("  ")).best.unwrap().to_number("k"), Ok(None));
        assert!(entry(json!(null)).best.is_none());

        let missing: OverrideEntry = serde_json::from_value(json!({ "min": 1 })).unwrap();
        assert!(missing.best.is_none());
        assert_eq!(missing.extra["min"], 1);
    }

    #[test]
    fn zero_is_present() {
        assert_eq!(entry(json!(0)).best.unwrap().to_number("k"), Ok(Some(0.0)));
        assert_eq!(entry(json!("0")).best.unwrap().to_number("k"), Ok(Some(0.0)));
    }

    #[test]
    fn numeric_strings_parse() {
        assert_eq!(entry(json!(" 0.25 ")).best.unwrap().to_number("k"), Ok(Some(0.25)));
    }

    #[test]
    fn garbage_is_a_conversion_error() {
        let err = entry(json!("abc")).best.unwrap().to_number("beta").unwrap_err();
        assert!(matches!(err, ConversionError::NotANumber { ref key, .. } if key == "beta"));

        let err = entry(json!(true)).best.unwrap().to_number("beta").unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedType { found: "boolean", .. }));

        let err = entry(json!("NaN")).best.unwrap().to_number("beta").unwrap_err();
        assert!(matches!(err, ConversionError::NonFinite { .. }));
    }

    #[test]
    fn extra_fields_round_trip() {
        let e = entry(json!(3));
        let back = serde_json::to_value(&e).unwrap();
        assert_eq!(back, json!({ "best": 3.0, "name": "x" }));
    }
}
