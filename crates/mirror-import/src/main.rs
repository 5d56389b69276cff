//! mirror-import - mirror remote file trees into object storage

use anyhow::{Context, Result};
use clap::Parser;
use mirror_common::logging::{init_logging, LogConfig, LogLevel};
use mirror_import::config::Config;
use mirror_import::storage::{ObjectStore, S3Store};
use mirror_import::{bootstrap, pipeline, signal, RunStats};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mirror-import")]
#[command(author, version, about = "Mirror HTTP directory trees and Yum repositories into object storage")]
struct Cli {
    /// Path to the YAML configuration file
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { LogLevel::Debug } else { LogLevel::Info };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(level)
        .log_file_prefix("mirror-import")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper_util=info")
        .build()
        .with_env_overrides()?;

    init_logging(&log_config)
}

async fn execute(config_path: &Path) -> Result<RunStats> {
    let config = Config::load(config_path)?;
    let jobs = bootstrap::build_jobs(&config)?;

    let storage = config.storage.clone().with_env_fallback();
    let store: Arc<dyn ObjectStore> = Arc::new(
        S3Store::connect(&storage)
            .await
            .context("Failed to connect to object storage")?,
    );

    let jobs = bootstrap::prepare_jobs(jobs, store.as_ref(), &config.pipeline).await?;
    let cancel = signal::shutdown_token().context("Failed to install signal handlers")?;

    Ok(pipeline::run(jobs, store, &config.pipeline, cancel).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    let started = Instant::now();
    match execute(&cli.config).await {
        Ok(_) => {
            info!("finished in {:.3?}", started.elapsed());
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        },
    }
}
