//! Incremental ordered-collection reconciliation.
//!
//! This crate keeps a locally displayed, index-addressed list in line with
//! a remote canonical order that arrives asynchronously. Items that are not
//! yet present must be fetched one by one before they can be inserted.
//!
//! - [`EntryStore`]: ordered collection with an id side index
//! - [`Reconciler`]: computes and applies removals, moves and insertions
//! - [`PendingQueue`]: serializes orders that arrive mid-reconcile
//! - [`ReconcileService`]: tokio task owning both, fed through a [`ServiceHandle`]
//! - [`ItemFetcher`], [`ChangeSink`], [`ReorderPublisher`]: collaborator seams
//!
//! # Architecture
//!
//! 1. The remote side pushes a canonical order via [`ServiceHandle::submit`]
//! 2. The service runs it now, or queues it if a reconcile is in flight
//! 3. The reconciler classifies the order against the store
//! 4. Removals and moves are applied synchronously, new ids are fetched in
//!    target order and inserted as they arrive
//! 5. Every structural change is reported to the [`ChangeSink`]
//! 6. The next queued order (the latest one, when coalescing) starts
//!
//! Orders that are not "kept ids plus one contiguous run of new ids" are
//! applied by a full reload instead: one bulk fetch and a single
//! [`Change::ReplaceAll`].
//!
//! # Example
//!
//! ```
//! use ordsync_common::{MemoryFetcher, Reconciler, RecordingSink};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fetcher = MemoryFetcher::with_items(vec![("a", 1), ("b", 2), ("c", 3)]);
//! let mut reconciler = Reconciler::new(fetcher, RecordingSink::new());
//!
//! reconciler.reconcile(vec!["a", "b"]).await;
//! reconciler.reconcile(vec!["b", "c"]).await;
//! assert_eq!(reconciler.store().order(), vec!["b", "c"]);
//! # }
//! ```

mod change;
mod config;
mod error;
mod fetch;
mod memory;
mod pending;
mod plan;
mod reconciler;
mod service;
mod status;
mod store;

pub use change::{Change, ChangeSink};
pub use config::{QueueConfig, QueuePolicy, ReconcilerConfig};
pub use error::{ConfigError, FetchError, PublishError, ServiceError, StoreError};
pub use fetch::{ItemFetcher, ReorderPublisher};
pub use memory::{MemoryFetcher, RecordingSink};
pub use pending::{PendingQueue, PendingRequest};
pub use plan::ReconcilePlan;
pub use reconciler::Reconciler;
pub use service::{spawn, Command, LocalEdit, ReconcileService, ServiceHandle};
pub use status::{ReconcileReport, ReconcileStatus, ReloadReason};
pub use store::{Entry, EntryStore, ItemId};
