//! Parameter reconciliation and run-result assembly for the Cova gateway.
//!
//! This crate turns loosely typed caller overrides into a bounded parameter
//! set, drives one run of an external simulation engine, and assembles the
//! response bundle:
//!
//! - Region-aware default catalog with `[min, max]` bounds
//! - Per-key reconciliation that records failures instead of aborting
//! - Engine invocation with a forced configuration and optional seed
//! - Plot figures, inline `data:` URI exports and summary statistics
//!
//! # Quick Start
//!
//! ```no_run
//! use cova_core::{Gateway, GatewayConfig, RunRequest};
//!
//! # fn example() -> anyhow::Result<()> {
//! let gateway = Gateway::from_config(GatewayConfig::load(None)?);
//! let result = gateway.run_sim(RunRequest::default(), false, None);
//! if !result.err.is_empty() {
//!     eprintln!("run finished with errors: {}", result.err);
//! }
//! println!("{} days, {} cases", result.summary.days, result.summary.cases);
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod reconcile;
pub mod session;
pub mod upload;

pub use catalog::{build_catalog, Catalog, Defaults, ParameterGroup, ParameterSpec, Region};
pub use config::GatewayConfig;
pub use engine::{Engine, EngineConfig, EngineOutput, EngineVersion, SubprocessEngine};
pub use errors::{EngineError, ErrorLog, UploadError};
pub use gateway::Gateway;
pub use model::{OverrideEntry, OverrideGroup, RunRequest, RunResult, SuppliedValue, Summary};
pub use reconcile::{reconcile, Reconciliation};
pub use session::{InMemorySessionStore, SessionStore};
pub use upload::UploadFormat;
