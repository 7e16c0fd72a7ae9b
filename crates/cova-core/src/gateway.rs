//! The four caller-facing operations, independent of any transport.

use chrono::Local;
use std::path::Path;
use std::sync::Arc;

use crate::assemble::{assemble, AssembleOptions};
use crate::catalog::{build_catalog, Catalog, Defaults, Region};
use crate::config::GatewayConfig;
use crate::engine::{Engine, EngineResult, SubprocessEngine};
use crate::errors::{ErrorLog, UploadError};
use crate::model::{RunRequest, RunResult};
use crate::orchestrator::run_once;
use crate::reconcile::reconcile;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::upload::{load_upload, parse_upload, UploadFormat};

/// Session key under which the last run summary is recorded.
pub const SESSION_SUMMARY_KEY: &str = "summary";

#[derive(Clone)]
pub struct Gateway {
    engine: Arc<dyn Engine>,
    config: GatewayConfig,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl Gateway {
    pub fn new(engine: Arc<dyn Engine>, config: GatewayConfig) -> Self {
        Self {
            engine,
            config,
            sessions: None,
        }
    }

    /// Gateway backed by the engine executable named in `config.engine`,
    /// with a bounded session store when `config.sessions.enabled`.
    pub fn from_config(config: GatewayConfig) -> Self {
        let engine = Arc::new(SubprocessEngine::new(config.engine.clone()));
        let sessions = config.sessions.clone();
        let gateway = Self::new(engine, config);
        if sessions.enabled {
            gateway.with_session_store(Arc::new(InMemorySessionStore::with_capacity(
                sessions.capacity,
            )))
        } else {
            gateway
        }
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.sessions.as_ref()
    }

    pub fn get_defaults(&self, region: Option<&str>, merge: bool) -> Defaults {
        build_catalog(Region::resolve(region, self.config.default_region), merge)
    }

    pub fn get_version(&self) -> EngineResult<String> {
        Ok(self.engine.version()?.to_string())
    }

    pub fn upload_pars(&self, path: &Path) -> Result<RunRequest, UploadError> {
        let request = load_upload(path)?;
        tracing::info!(
            path = %path.display(),
            sim = request.sim_pars.len(),
            epi = request.epi_pars.len(),
            "parameters uploaded"
        );
        Ok(request)
    }

    pub fn upload_content(
        &self,
        content: &str,
        format: UploadFormat,
    ) -> Result<RunRequest, UploadError> {
        parse_upload(content, format)
    }

    /// Reconcile, run, assemble. Never fails: every recoverable problem ends
    /// up in `RunResult::err`.
    pub fn run_sim(&self, request: RunRequest, verbose: bool, session: Option<&str>) -> RunResult {
        let span = tracing::info_span!("run_sim", session = session.unwrap_or("-"));
        let _guard = span.enter();

        let catalog = Catalog::build(self.config.default_region);
        let reconciled = reconcile(&catalog, request.sim_pars, request.epi_pars);
        let mut errors = ErrorLog::new();
        errors.extend(reconciled.errors);

        let outcome = run_once(self.engine.as_ref(), &reconciled.params, verbose, &mut errors);

        let opts = AssembleOptions {
            plots: &self.config.plots,
            file_prefix: &self.config.exports.file_prefix,
            timestamp: Local::now().naive_local(),
        };
        let assembled = assemble(self.engine.as_ref(), outcome.output.as_ref(), &opts, &mut errors);

        let result = RunResult {
            err: errors.render(),
            sim_pars: reconciled.sim_pars,
            epi_pars: reconciled.epi_pars,
            graphs: assembled.graphs,
            files: assembled.files,
            summary: assembled.summary,
        };

        if result.err.is_empty() {
            tracing::info!(
                days = result.summary.days,
                cases = result.summary.cases,
                deaths = result.summary.deaths,
                "run complete"
            );
        } else {
            tracing::warn!(errors = errors.len(), "run completed with errors");
        }

        if let (Some(store), Some(session)) = (&self.sessions, session) {
            match serde_json::to_value(result.summary) {
                Ok(v) => store.put(session, SESSION_SUMMARY_KEY, v),
                Err(e) => tracing::warn!(error = %e, "could not record session summary"),
            }
        }

        result
    }
}
