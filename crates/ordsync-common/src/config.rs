//! Reconciler configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the pending queue treats orders that arrive while reconciling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Keep only the latest queued order
    #[default]
    Coalesce,
    /// Replay every queued order in arrival order (bounded)
    Fifo,
}

/// Pending queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue policy
    #[serde(default)]
    pub policy: QueuePolicy,

    /// Maximum queued orders under `fifo`
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

/// Complete reconciler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Pending queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Per-fetch timeout in milliseconds (0 disables)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// Populate an empty store with one bulk fetch
    #[serde(default = "default_initial_load_in_bulk")]
    pub initial_load_in_bulk: bool,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_fetch_timeout() -> u64 {
    10_000
}

fn default_initial_load_in_bulk() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            policy: QueuePolicy::default(),
            capacity: default_queue_capacity(),
        }
    }
}

impl QueueConfig {
    /// Sets the policy.
    pub fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            fetch_timeout_ms: default_fetch_timeout(),
            initial_load_in_bulk: default_initial_load_in_bulk(),
        }
    }
}

impl ReconcilerConfig {
    /// Sets the queue configuration.
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Sets the per-fetch timeout; `None` disables it.
    ///
    /// A timeout is kept to whole milliseconds, and never rounds down to zero.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout_ms = timeout.map_or(0, |t| (t.as_millis() as u64).max(1));
        self
    }

    /// Sets whether an empty store is populated in bulk.
    pub fn with_initial_load_in_bulk(mut self, bulk: bool) -> Self {
        self.initial_load_in_bulk = bulk;
        self
    }

    /// Per-fetch timeout as a `Duration`, if enabled.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_ms > 0).then(|| Duration::from_millis(self.fetch_timeout_ms))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.policy == QueuePolicy::Fifo && self.queue.capacity == 0 {
            return Err(ConfigError::invalid_config(
                "queue.capacity",
                "fifo queue needs a capacity of at least 1",
            ));
        }
        Ok(())
    }
}
