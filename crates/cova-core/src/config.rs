//! Gateway configuration.
//!
//! Resolution order: built-in defaults, then an optional YAML file, then
//! `COVA_*` environment variables. CLI flags are applied by the binary on top.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `COVA_DEFAULT_REGION` | Region used when a request names none (default: `Example`) |
//! | `COVA_ENGINE_BIN` | Engine executable (default: `covasim-engine`) |
//! | `COVA_ENGINE_TIMEOUT` | Hard deadline for one engine call, in seconds (default: 300) |
//! | `COVA_MAX_CONCURRENT_RUNS` | Engine runs allowed in flight at once (default: 4) |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::assemble::{default_plots, MetricGroup};
use crate::catalog::Region;
use crate::engine::SubprocessEngineConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub default_region: Region,
    pub engine: SubprocessEngineConfig,
    pub exports: ExportConfig,
    /// Metric groups plotted per run.
    pub plots: Vec<MetricGroup>,
    pub server: ServerConfig,
    pub sessions: SessionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_region: Region::default(),
            engine: SubprocessEngineConfig::default(),
            exports: ExportConfig::default(),
            plots: default_plots(),
            server: ServerConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: "COVASim_results".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub max_concurrent_runs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
        }
    }
}

/// Per-session summary store. Off unless enabled; bounded when on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enabled: bool,
    /// Sessions kept before the least recently written one is evicted.
    pub capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 1024,
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse gateway config YAML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults, optional file, then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("COVA_DEFAULT_REGION") {
            match Region::from_name(&v) {
                Some(r) => self.default_region = r,
                None => tracing::warn!(region = %v, "COVA_DEFAULT_REGION is not a known region; ignoring"),
            }
        }

        if let Some(v) = lookup("COVA_ENGINE_BIN") {
            self.engine.command = PathBuf::from(v);
        }

        if let Some(v) = lookup("COVA_ENGINE_TIMEOUT") {
            match v.trim().parse() {
                Ok(secs) => self.engine.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %v, "COVA_ENGINE_TIMEOUT is not a number; ignoring"),
            }
        }

        if let Some(v) = lookup("COVA_MAX_CONCURRENT_RUNS") {
            match v.trim().parse() {
                Ok(n) => self.server.max_concurrent_runs = n,
                Err(_) => tracing::warn!(value = %v, "COVA_MAX_CONCURRENT_RUNS is not a number; ignoring"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.engine.timeout_secs == 0 {
            return Err("engine.timeout_secs must be greater than zero".to_string());
        }
        if self.server.max_concurrent_runs == 0 {
            return Err("server.max_concurrent_runs must be greater than zero".to_string());
        }
        if self.sessions.enabled && self.sessions.capacity == 0 {
            return Err("sessions.capacity must be greater than zero".to_string());
        }
        if let Some(group) = self.plots.iter().find(|g| g.series.is_empty()) {
            return Err(format!("plot group \"{}\" has no series", group.title));
        }
        Ok(())
    }
}
