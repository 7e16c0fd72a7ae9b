//! Build the engine configuration from reconciled parameters and run it once.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::engine::{Engine, EngineConfig, EngineOutput};
use crate::errors::ErrorLog;
use crate::reconcile::ReconciledParams;

/// Key whose reconciled value seeds the engine.
pub const SEED_KEY: &str = "seed";

/// Result of [`run_once`]. `output` is `None` when the engine failed without
/// producing anything usable.
#[derive(Debug)]
pub struct RunOutcome {
    pub output: Option<EngineOutput>,
    pub config: EngineConfig,
}

pub fn build_config(params: &ReconciledParams, verbose: bool) -> EngineConfig {
    let mut parameters = BTreeMap::new();
    let mut seed = None;
    for (key, value) in params {
        let Some(v) = value else { continue };
        if key == SEED_KEY {
            seed = Some(v.trunc().max(0.0) as u64);
        } else {
            parameters.insert(key.clone(), *v);
        }
    }

    let seed = seed.unwrap_or_else(|| {
        let s = u64::from(rand::random::<u32>());
        tracing::info!(seed = s, "no seed provided, using generated seed");
        s
    });

    EngineConfig {
        parameters,
        verbose,
        seed,
        cfr_by_age: false,
    }
}

/// Run the engine once. Engine failures are recorded in `errors`; whatever
/// partial output the engine left behind is still returned.
pub fn run_once(
    engine: &dyn Engine,
    params: &ReconciledParams,
    verbose: bool,
    errors: &mut ErrorLog,
) -> RunOutcome {
    let config = build_config(params, verbose);
    if verbose {
        tracing::info!(parameters = ?config.parameters, seed = config.seed, "input parameters");
    } else {
        tracing::debug!(parameters = ?config.parameters, seed = config.seed, "input parameters");
    }

    let started = Instant::now();
    let output = match engine.run(&config) {
        Ok(out) => {
            tracing::info!(
                npts = out.npts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "engine run finished"
            );
            Some(out)
        }
        Err(mut e) => {
            errors.engine(&e);
            e.take_partial()
        }
    };

    RunOutcome { output, config }
}
