//! Contract with the external simulation engine.
//!
//! The engine is opaque: it takes a flat configuration mapping, runs once, and
//! hands back a day-indexed result table plus two export forms. The gateway
//! ships [`SubprocessEngine`], which talks to an engine executable over a
//! single JSON request/response exchange.

pub mod subprocess;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::EngineError;

pub use subprocess::{SubprocessEngine, SubprocessEngineConfig};

/// Day index series.
pub const SERIES_DAY: &str = "t";
/// Cumulative infections series.
pub const SERIES_CUM_INFECTIONS: &str = "cum_exposed";
/// Cumulative deaths series.
pub const SERIES_CUM_DEATHS: &str = "cum_deaths";

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine version identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    pub version: String,
    pub date: String,
}

impl std::fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Version {} ({})", self.version, self.date)
    }
}

/// Configuration for a single engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Parameters with a value; absent parameters fall back to engine defaults.
    pub parameters: BTreeMap<String, f64>,
    pub verbose: bool,
    pub seed: u64,
    /// Age-stratified fatality adjustment. Always off so caller CFR overrides hold.
    pub cfr_by_age: bool,
}

impl EngineConfig {
    /// Engine-facing mapping. Integral values are rendered as JSON integers.
    pub fn to_flat_map(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in &self.parameters {
            out.insert(key.clone(), number_value(*value));
        }
        out.insert("verbose".into(), Value::Bool(self.verbose));
        out.insert("seed".into(), Value::from(self.seed));
        out.insert("cfr_by_age".into(), Value::Bool(self.cfr_by_age));
        out
    }
}

fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Named result series, each one value per simulated point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    series: BTreeMap<String, Vec<f64>>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn last(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|s| s.last().copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// What the engine produced for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOutput {
    pub npts: usize,
    pub results: ResultTable,
    /// Configuration the engine reports it actually used.
    pub parameters: Map<String, Value>,
    /// Spreadsheet export, when the engine produced one.
    pub spreadsheet: Option<Vec<u8>>,
    /// JSON export, when the engine produced its own.
    pub json: Option<String>,
}

pub trait Engine: Send + Sync {
    fn version(&self) -> EngineResult<EngineVersion>;

    fn run(&self, config: &EngineConfig) -> EngineResult<EngineOutput>;

    /// Spreadsheet-form export of a finished run.
    fn export_xlsx(&self, output: &EngineOutput) -> EngineResult<Vec<u8>> {
        output
            .spreadsheet
            .clone()
            .ok_or(EngineError::ExportUnavailable { format: "xlsx" })
    }

    /// JSON-form export of a finished run.
    ///
    /// Falls back to `{"parameters": …, "results": …}` when the engine did not
    /// supply its own rendering.
    fn export_json(&self, output: &EngineOutput) -> EngineResult<String> {
        if let Some(json) = &output.json {
            return Ok(json.clone());
        }
        let doc = serde_json::json!({
            "parameters": output.parameters,
            "results": output.results,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl Engine for Null {
        fn version(&self) -> EngineResult<EngineVersion> {
            Ok(EngineVersion {
                version: "0.0".into(),
                date: "never".into(),
            })
        }

        fn run(&self, _config: &EngineConfig) -> EngineResult<EngineOutput> {
            Ok(EngineOutput::default())
        }
    }

    #[test]
    fn flat_map_forces_cfr_flag_and_integers() {
        let mut parameters = BTreeMap::new();
        parameters.insert("n".to_string(), 2000.0);
        parameters.insert("beta".to_string(), 0.015);
        let cfg = EngineConfig {
            parameters,
            verbose: false,
            seed: 7,
            cfr_by_age: false,
        };

        let map = cfg.to_flat_map();
        assert_eq!(map["n"], Value::from(2000));
        assert!(map["n"].is_i64());
        assert_eq!(map["beta"], 0.015);
        assert_eq!(map["seed"], 7);
        assert_eq!(map["cfr_by_age"], false);
    }

    #[test]
    fn default_exports() {
        let mut out = EngineOutput::default();
        out.results.insert(SERIES_DAY, vec![0.0, 1.0]);

        let err = Null.export_xlsx(&out).unwrap_err();
        assert!(matches!(err, EngineError::ExportUnavailable { format: "xlsx" }));

        let json: Value = serde_json::from_str(&Null.export_json(&out).unwrap()).unwrap();
        assert_eq!(json["results"]["t"], serde_json::json!([0.0, 1.0]));
    }

    #[test]
    fn version_display() {
        let v = Null.version().unwrap();
        assert_eq!(v.to_string(), "Version 0.0 (never)");
    }
}
