//! Error types for the run pipeline.
//!
//! Three classes of failure exist. Catalog and conversion failures (bad keys,
//! unreadable values) and engine failures are recoverable: they are rendered to
//! text and collected in an [`ErrorLog`] that ends up in `RunResult.err`.
//! Upload failures are the only hard error surfaced to the caller.

use std::time::Duration;

/// A parameter key could not be resolved against the default catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown parameter key \"{key}\"")]
    UnknownKey { key: String },
}

/// A caller-supplied `best` value could not be read as a number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("could not parse {raw:?} as a number for \"{key}\"")]
    NotANumber { key: String, raw: String },

    #[error("value for \"{key}\" is not finite")]
    NonFinite { key: String },

    #[error("value for \"{key}\" must be a number or numeric string, got {found}")]
    UnsupportedType { key: String, found: &'static str },
}

/// An uploaded parameter document was rejected.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read uploaded file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("uploaded file is not valid {format}: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("uploaded file was a {found} rather than a mapping")]
    NotAMapping { found: &'static str },

    #[error("parameters file must have keys \"sim_pars\" and \"epi_pars\"; missing \"{key}\"")]
    MissingGroup { key: String },

    #[error("parameters file must have only keys \"sim_pars\" and \"epi_pars\"; found \"{key}\"")]
    UnexpectedKey { key: String },

    #[error("parameters file failed schema validation:\n{details}")]
    Schema { details: String },
}

/// Failure reported by (or while talking to) the simulation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine did not finish within {after:?}")]
    Timeout { after: Duration },

    #[error("engine exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("engine protocol error: {0}")]
    Protocol(String),

    #[error("{message}")]
    Run {
        message: String,
        partial: Option<Box<crate::engine::EngineOutput>>,
    },

    #[error("engine did not provide a {format} export")]
    ExportUnavailable { format: &'static str },
}

impl EngineError {
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run {
            message: message.into(),
            partial: None,
        }
    }

    /// Split off whatever output the engine produced before failing.
    pub fn take_partial(&mut self) -> Option<crate::engine::EngineOutput> {
        match self {
            Self::Run { partial, .. } => partial.take().map(|b| *b),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Ordered collection of recoverable failures for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(error = %message, "pipeline error recorded");
        self.entries.push(message);
    }

    pub fn conversion(&mut self, key: &str, err: impl std::fmt::Display) {
        self.push(format!("Parameter conversion failed for \"{key}\": {err}"));
    }

    pub fn engine(&mut self, err: &EngineError) {
        self.push(format!("Sim run failed! ({err})"));
    }

    pub fn assembly(&mut self, err: impl std::fmt::Display) {
        self.push(format!("Result assembly: {err}"));
    }

    pub fn extend(&mut self, other: ErrorLog) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Single string form used for `RunResult.err`; empty on full success.
    pub fn render(&self) -> String {
        self.entries.join("; ")
    }
}
