use anyhow::{Context, Result};
use clap::Parser;
use cova_core::{Gateway, GatewayConfig, Region};
use cova_server::Server;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(clap::ValueEnum, Clone, Debug, Default, PartialEq)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "cova-server",
    version,
    about = "JSON-RPC gateway that reconciles simulation parameters and runs the engine"
)]
struct Cli {
    /// Gateway config file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine executable; overrides config and COVA_ENGINE_BIN
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Extra argument passed to the engine (repeatable)
    #[arg(long = "engine-arg")]
    engine_args: Vec<String>,

    /// Engine deadline in seconds
    #[arg(long)]
    engine_timeout: Option<u64>,

    /// Region used when a request names none
    #[arg(long)]
    default_region: Option<String>,

    #[arg(long)]
    max_concurrent_runs: Option<usize>,

    /// Keep the last run summary for up to N sessions
    #[arg(long, value_name = "N")]
    session_capacity: Option<usize>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_tracing(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn resolve_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut cfg = GatewayConfig::load(cli.config.as_deref())?;
    if let Some(engine) = &cli.engine {
        cfg.engine.command = engine.clone();
    }
    if !cli.engine_args.is_empty() {
        cfg.engine.args = cli.engine_args.clone();
    }
    if let Some(secs) = cli.engine_timeout {
        cfg.engine.timeout_secs = secs;
    }
    if let Some(name) = &cli.default_region {
        cfg.default_region = Region::from_name(name)
            .with_context(|| format!("unknown region \"{name}\""))?;
    }
    if let Some(n) = cli.max_concurrent_runs {
        cfg.server.max_concurrent_runs = n;
    }
    if let Some(n) = cli.session_capacity {
        cfg.sessions.enabled = true;
        cfg.sessions.capacity = n;
    }
    cfg.validate().map_err(anyhow::Error::msg)?;
    Ok(cfg)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    let cfg = resolve_config(&cli).context("invalid gateway configuration")?;
    tracing::info!(
        engine = %cfg.engine.command.display(),
        region = %cfg.default_region,
        max_concurrent_runs = cfg.server.max_concurrent_runs,
        "cova-server starting"
    );

    Server::new(Gateway::from_config(cfg))
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("server loop failed")?;

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
