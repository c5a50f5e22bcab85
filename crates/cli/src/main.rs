use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openmvgo_core::{
    config::CONFIG_ENV_VAR, create_storage, load_config, validate_config, Orchestrator,
    ProcessRunner, SanitizedConfig,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Photogrammetry pipeline: openMVG sparse reconstruction followed by openMVS
/// densification, meshing and texturing.
#[derive(Debug, Parser)]
#[command(name = "openmvgo", version)]
struct Args {
    /// Configuration file (default: $OPENMVGO_CONFIG, then ./openmvgo.toml if present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate the configuration and check that every tool is installed, then exit
    #[arg(long)]
    check: bool,
}

impl Args {
    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Args::parse()).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config_path();
    let loaded = load_config(config_path.as_deref());

    // Logging format comes from the config; fall back to plain text when it does not load.
    init_logging(loaded.as_ref().map(|c| c.logging.json).unwrap_or(false));
    info!("OpenMVGO v{}", VERSION);

    let config = match &config_path {
        Some(path) => loaded.with_context(|| format!("Failed to load config from {:?}", path))?,
        None => loaded.context("Failed to load config")?,
    };
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        config = %serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default(),
        "Configuration loaded"
    );

    let runner = Arc::new(ProcessRunner::new(config.runner.clone()));
    let storage = create_storage(&config).context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.name());

    let orchestrator =
        Orchestrator::new(config, runner, storage).context("Failed to initialize pipeline")?;

    if args.check {
        orchestrator
            .check_tools()
            .await
            .context("Tool check failed")?;
        info!("Configuration and tools OK");
        return Ok(());
    }

    let report = orchestrator.run().await.context("Pipeline failed")?;
    info!(
        run_id = %report.run_id,
        registered_cameras = report.sfm.registered_cameras,
        mesh = %report.mvs.mesh_file.display(),
        tool_ms = report.tool_duration_ms(),
        "Run finished"
    );
    println!("OpenMVGO pipeline completed successfully!");

    Ok(())
}
