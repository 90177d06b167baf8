//! Integration test infrastructure for ordsync reconcilers
//!
//! Provides:
//! - Gated fetchers for holding a reconcile in flight
//! - A mirroring sink that replays change events like a list adapter
//! - Seeded order generators for property tests
//! - Store and change-stream verification helpers

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
