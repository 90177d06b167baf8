//! Command line arguments

use crate::config_file::ReplayConfig;
use clap::{Parser, ValueEnum};
use ordsync_common::QueuePolicy;
use std::path::PathBuf;

/// Queue policy as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Keep only the latest queued order
    Coalesce,
    /// Replay every queued order
    Fifo,
}

impl From<PolicyArg> for QueuePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Coalesce => QueuePolicy::Coalesce,
            PolicyArg::Fifo => QueuePolicy::Fifo,
        }
    }
}

/// Replay a canonical-order scenario through the reconciler
#[derive(Parser, Debug)]
#[command(name = "ordsync-replay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Scenario file (TOML)
    #[arg(short = 's', long)]
    pub scenario: PathBuf,

    /// Configuration file (TOML); defaults apply when absent
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    pub log_level: String,

    /// Pretty-print each JSON event
    #[arg(long)]
    pub pretty: bool,

    /// Override the pending queue policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Override the per-fetch timeout in milliseconds (0 disables)
    #[arg(long)]
    pub fetch_timeout_ms: Option<u64>,
}

impl Args {
    /// Applies command line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut ReplayConfig) {
        if self.pretty {
            config.output.pretty = true;
        }
        if let Some(policy) = self.policy {
            config.reconciler.queue.policy = policy.into();
        }
        if let Some(timeout) = self.fetch_timeout_ms {
            config.reconciler.fetch_timeout_ms = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_args() {
        let args = Args::try_parse_from(["ordsync-replay", "--scenario", "s.toml"]).unwrap();

        assert_eq!(args.scenario, PathBuf::from("s.toml"));
        assert_eq!(args.config, None);
        assert_eq!(args.log_level, "warn");

        let mut config = ReplayConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config, ReplayConfig::default());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let args = Args::try_parse_from([
            "ordsync-replay",
            "-s",
            "s.toml",
            "--pretty",
            "--policy",
            "fifo",
            "--fetch-timeout-ms",
            "0",
        ])
        .unwrap();

        let mut config = ReplayConfig::default();
        args.apply_overrides(&mut config);
        assert!(config.output.pretty);
        assert_eq!(config.reconciler.queue.policy, QueuePolicy::Fifo);
        assert_eq!(config.reconciler.fetch_timeout(), None);
    }

    #[test]
    fn test_scenario_is_required() {
        assert!(Args::try_parse_from(["ordsync-replay"]).is_err());
    }
}
