//! Validation of uploaded parameter documents.
//!
//! An upload must be a mapping with exactly the keys `sim_pars` and
//! `epi_pars`. This is the one failure surfaced to the caller as an error:
//! nothing downstream can run from a document of the wrong shape.

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::Draft;
use serde_json::Value;

use crate::errors::UploadError;
use crate::model::{json_type_name, RunRequest};

pub const SIM_GROUP_KEY: &str = "sim_pars";
pub const EPI_GROUP_KEY: &str = "epi_pars";

const RUN_REQUEST_V1_SCHEMA_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/run_request_v1.schema.json"
));

static VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn compiled_validator() -> Result<&'static jsonschema::Validator, UploadError> {
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(RUN_REQUEST_V1_SCHEMA_JSON)
                .map_err(|e| format!("failed to parse embedded run_request_v1 schema: {e}"))?;
            jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&schema)
                .map_err(|e| format!("failed to compile run_request_v1 schema: {e}"))
        })
        .as_ref()
        .map_err(|e| UploadError::Schema { details: e.clone() })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadFormat {
    #[default]
    Json,
    Yaml,
}

impl UploadFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                UploadFormat::Yaml
            }
            _ => UploadFormat::Json,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(UploadFormat::Json),
            "yaml" | "yml" => Some(UploadFormat::Yaml),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            UploadFormat::Json => "JSON",
            UploadFormat::Yaml => "YAML",
        }
    }
}

pub fn load_upload(path: &Path) -> Result<RunRequest, UploadError> {
    let content = std::fs::read_to_string(path).map_err(|source| UploadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_upload(&content, UploadFormat::from_path(path))
}

pub fn parse_upload(content: &str, format: UploadFormat) -> Result<RunRequest, UploadError> {
    let doc: Value = match format {
        UploadFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        UploadFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    }
    .map_err(|message| UploadError::Parse {
        format: format.label(),
        message,
    })?;
    validate_upload(doc)
}

pub fn validate_upload(doc: Value) -> Result<RunRequest, UploadError> {
    let Value::Object(map) = &doc else {
        return Err(UploadError::NotAMapping {
            found: json_type_name(&doc),
        });
    };
    for key in [SIM_GROUP_KEY, EPI_GROUP_KEY] {
        if !map.contains_key(key) {
            return Err(UploadError::MissingGroup { key: key.into() });
        }
    }
    if let Some(extra) = map
        .keys()
        .find(|k| k.as_str() != SIM_GROUP_KEY && k.as_str() != EPI_GROUP_KEY)
    {
        return Err(UploadError::UnexpectedKey { key: extra.clone() });
    }

    let validator = compiled_validator()?;
    if !validator.is_valid(&doc) {
        const MAX_ERRORS: usize = 10;
        let details = validator
            .iter_errors(&doc)
            .take(MAX_ERRORS)
            .enumerate()
            .map(|(i, e)| format!("{:02}: {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(UploadError::Schema { details });
    }

    serde_json::from_value(doc).map_err(|e| UploadError::Schema {
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_compiles() {
        compiled_validator().expect("schema should compile");
    }

    #[test]
    fn accepts_both_groups() {
        let req = validate_upload(json!({
            "sim_pars": { "n": { "best": 100, "name": "Population size" } },
            "epi_pars": { "beta": { "best": "0.02" } }
        }))
        .unwrap();
        assert_eq!(req.sim_pars["n"].best_number(), Some(100.0));
        assert!(req.epi_pars.contains_key("beta"));
    }

    #[test]
    fn missing_epi_group_is_named() {
        let err = validate_upload(json!({ "sim_pars": {} })).unwrap_err();
        assert!(matches!(err, UploadError::MissingGroup { ref key } if key == "epi_pars"));
        assert!(err.to_string().contains("epi_pars"));
    }

    #[test]
    fn non_mapping_is_rejected() {
        let err = validate_upload(json!([1, 2])).unwrap_err();
        assert!(matches!(err, UploadError::NotAMapping { found: "array" }));
    }

    #[test]
    fn extra_top_level_key_is_rejected() {
        let err = validate_upload(json!({ "sim_pars": {}, "epi_pars": {}, "notes": "x" })).unwrap_err();
        assert!(matches!(err, UploadError::UnexpectedKey { ref key } if key == "notes"));
    }

    #[test]
    fn malformed_entries_fail_schema() {
        let err = validate_upload(json!({ "sim_pars": { "n": 5 }, "epi_pars": {} })).unwrap_err();
        assert!(matches!(err, UploadError::Schema { .. }), "{err}");
    }

    #[test]
    fn yaml_documents_are_accepted() {
        let yaml = "sim_pars:\n  n:\n    best: 250\nepi_pars: {}\n";
        let req = parse_upload(yaml, UploadFormat::Yaml).unwrap();
        assert_eq!(req.sim_pars["n"].best_number(), Some(250.0));
    }

    #[test]
    fn unparsable_json_is_a_parse_error() {
        let err = parse_upload("{ nope", UploadFormat::Json).unwrap_err();
        assert!(matches!(err, UploadError::Parse { format: "JSON", .. }));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pars.json");
        std::fs::write(&path, r#"{"sim_pars":{},"epi_pars":{"dur":{"best":9}}}"#).unwrap();
        let req = load_upload(&path).unwrap();
        assert_eq!(req.epi_pars["dur"].best_number(), Some(9.0));

        let err = load_upload(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }
}
