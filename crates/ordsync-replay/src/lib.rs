//! ordsync-replay: scenario replay for the ordsync reconciler
//!
//! Loads a TOML scenario (item catalogue plus a list of order pushes and
//! local edits), feeds it to a reconcile service backed by an in-memory
//! catalogue, and writes every change event as a JSON line.

pub mod cli;
pub mod config_file;
pub mod error;
pub mod runner;
pub mod scenario;
pub mod sink;

pub use cli::{Args, PolicyArg};
pub use config_file::{OutputConfig, ReplayConfig};
pub use error::{ReplayError, Result};
pub use runner::{replay, ScenarioFetcher, ScenarioPublisher};
pub use scenario::{Scenario, ScenarioItem, Step};
pub use sink::JsonLinesSink;
