//! ordsync-replay - canonical-order scenario replay
//!
//! Entry point for the replay tool. Events go to stdout, logs to stderr.

use anyhow::Context;
use clap::Parser;
use ordsync_replay::{replay, Args, ReplayConfig, Scenario};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initializes tracing/logging subsystem
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ReplayConfig::load_or_default(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReplayConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;

    info!(
        scenario = %args.scenario.display(),
        policy = ?config.reconciler.queue.policy,
        "starting replay"
    );
    replay(&scenario, &config, std::io::stdout()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("ordsync-replay failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
