//! Reconcile service: the single event queue in front of a reconciler.
//!
//! The service is one tokio task that owns the [`Reconciler`] and the
//! [`PendingQueue`]. Every command (order pushes, local edits) is delivered
//! over one channel and handled on that task, so the store never sees two
//! mutations at once. While a reconcile call is awaiting a fetch the task
//! keeps draining the channel:
//!
//! - order pushes go to the pending queue
//! - local edits are deferred until the active reconcile finishes
//! - shutdown drops the in-flight reconcile immediately
//!
//! When the task ends it hands the reconciler back through its `JoinHandle`.

use crate::change::ChangeSink;
use crate::error::ServiceError;
use crate::fetch::{ItemFetcher, ReorderPublisher};
use crate::pending::{PendingQueue, PendingRequest};
use crate::reconciler::Reconciler;
use crate::store::ItemId;
use chrono::Utc;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A local edit routed through the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEdit<K, T> {
    /// Remove a single id
    Remove(K),
    /// Insert an item whose payload is already known
    Insert {
        /// Requested position (clamped)
        index: usize,
        /// The new id
        id: K,
        /// Its payload
        payload: T,
    },
    /// Drag-and-drop move; published to the remote side if a publisher is set
    Move {
        /// Current position
        from: usize,
        /// New position
        to: usize,
    },
    /// Reload the current canonical order in bulk
    Reload,
}

/// A message for the service task.
#[derive(Debug)]
pub enum Command<K, T> {
    /// A new canonical order
    Submit(Vec<K>),
    /// A local edit
    Edit(LocalEdit<K, T>),
    /// Stop the service
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Cloneable handle used to talk to a running service.
#[derive(Debug)]
pub struct ServiceHandle<K, T> {
    tx: mpsc::UnboundedSender<Command<K, T>>,
    cancel: CancellationToken,
}

impl<K, T> Clone for ServiceHandle<K, T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<K, T> ServiceHandle<K, T> {
    fn send(&self, command: Command<K, T>) -> Result<(), ServiceError> {
        self.tx.send(command).map_err(|_| ServiceError::Closed)
    }

    /// Pushes a new canonical order.
    pub fn submit(&self, order: Vec<K>) -> Result<(), ServiceError> {
        self.send(Command::Submit(order))
    }

    /// Removes a single id.
    pub fn remove(&self, id: K) -> Result<(), ServiceError> {
        self.send(Command::Edit(LocalEdit::Remove(id)))
    }

    /// Inserts an item whose payload is already known.
    pub fn insert(&self, index: usize, id: K, payload: T) -> Result<(), ServiceError> {
        self.send(Command::Edit(LocalEdit::Insert { index, id, payload }))
    }

    /// Moves an item locally (drag and drop).
    pub fn move_item(&self, from: usize, to: usize) -> Result<(), ServiceError> {
        self.send(Command::Edit(LocalEdit::Move { from, to }))
    }

    /// Reloads the current canonical order in bulk.
    pub fn reload(&self) -> Result<(), ServiceError> {
        self.send(Command::Edit(LocalEdit::Reload))
    }

    /// Stops the service once this command is read.
    ///
    /// A reconcile still in flight at that point is dropped, along with any
    /// queued orders and deferred edits.
    pub fn shutdown(&self) -> Result<(), ServiceError> {
        self.send(Command::Shutdown)
    }

    /// Stops the service now, dropping any in-flight reconcile.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if the service task is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owns a reconciler and serializes everything that touches it.
pub struct ReconcileService<K, T, F, S>
where
    K: ItemId,
{
    reconciler: Reconciler<K, T, F, S>,
    queue: PendingQueue<K>,
    publisher: Option<Box<dyn ReorderPublisher<K>>>,
    deferred: VecDeque<LocalEdit<K, T>>,
    rx: mpsc::UnboundedReceiver<Command<K, T>>,
    cancel: CancellationToken,
}

impl<K, T, F, S> ReconcileService<K, T, F, S>
where
    K: ItemId,
    T: Send + 'static,
    F: ItemFetcher<K, T>,
    S: ChangeSink<K, T>,
{
    /// Wraps `reconciler`; the queue policy comes from its configuration.
    pub fn new(reconciler: Reconciler<K, T, F, S>) -> (Self, ServiceHandle<K, T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let queue = PendingQueue::new(reconciler.config().queue.clone());
        let service = Self {
            reconciler,
            queue,
            publisher: None,
            deferred: VecDeque::new(),
            rx,
            cancel: cancel.clone(),
        };
        (service, ServiceHandle { tx, cancel })
    }

    /// Sets the publisher that receives locally reordered collections.
    pub fn with_publisher(mut self, publisher: impl ReorderPublisher<K> + 'static) -> Self {
        self.publisher = Some(Box::new(publisher));
        self
    }

    /// Runs until shutdown, cancellation, or every handle is dropped.
    pub async fn run(mut self) -> Reconciler<K, T, F, S> {
        info!(policy = ?self.queue.policy(), "reconcile service started");

        loop {
            let command = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            if self.handle(command).await == Flow::Stop {
                break;
            }
        }

        if !self.queue.is_empty() || !self.deferred.is_empty() {
            debug!(
                queued = self.queue.len(),
                deferred = self.deferred.len(),
                "discarding pending work"
            );
        }
        self.queue.clear();
        self.deferred.clear();
        info!(
            superseded = self.queue.superseded_count(),
            dropped = self.queue.dropped_count(),
            "reconcile service stopped"
        );
        self.reconciler
    }

    async fn handle(&mut self, command: Command<K, T>) -> Flow {
        match command {
            Command::Submit(order) => match self.queue.submit(order) {
                Some(request) => self.drive(request).await,
                None => Flow::Continue,
            },
            Command::Edit(edit) => {
                self.apply_edit(edit).await;
                Flow::Continue
            }
            Command::Shutdown => Flow::Stop,
        }
    }

    async fn drive(&mut self, first: PendingRequest<K>) -> Flow {
        let mut next = Some(first);
        while let Some(request) = next {
            let waited = Utc::now() - request.enqueued_at;
            debug!(
                len = request.order.len(),
                waited_ms = waited.num_milliseconds(),
                "reconciling order"
            );
            if self.run_one(request.order).await == Flow::Stop {
                return Flow::Stop;
            }
            while let Some(edit) = self.deferred.pop_front() {
                self.apply_edit(edit).await;
            }
            next = self.queue.complete();
        }
        Flow::Continue
    }

    async fn run_one(&mut self, order: Vec<K>) -> Flow {
        let Self {
            reconciler,
            queue,
            deferred,
            rx,
            cancel,
            ..
        } = self;

        let reconcile = reconciler.reconcile(order);
        tokio::pin!(reconcile);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Flow::Stop,
                report = &mut reconcile => {
                    debug!(
                        status = ?report.status,
                        reason = ?report.reload_reason,
                        changes = report.change_count(),
                        failed = report.failed.len(),
                        "reconcile finished"
                    );
                    return Flow::Continue;
                }
                Some(command) = rx.recv() => match command {
                    Command::Submit(order) => {
                        queue.submit(order);
                    }
                    Command::Edit(edit) => deferred.push_back(edit),
                    Command::Shutdown => return Flow::Stop,
                },
            }
        }
    }

    async fn apply_edit(&mut self, edit: LocalEdit<K, T>) {
        match edit {
            LocalEdit::Remove(id) => {
                if self.reconciler.remove_item(&id).is_none() {
                    debug!(id = ?id, "remove: id not present");
                }
            }
            LocalEdit::Insert { index, id, payload } => {
                if let Err(e) = self.reconciler.insert_item(index, id, payload) {
                    warn!(error = %e, "local insert rejected");
                }
            }
            LocalEdit::Move { from, to } => self.move_and_publish(from, to).await,
            LocalEdit::Reload => {
                let order = self.reconciler.canonical_order().to_vec();
                self.reconciler.reload(order).await;
            }
        }
    }

    async fn move_and_publish(&mut self, from: usize, to: usize) {
        let previous = match self.reconciler.move_item(from, to) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "local move rejected");
                return;
            }
        };
        if previous.as_slice() == self.reconciler.canonical_order() {
            return;
        }
        let Some(publisher) = &self.publisher else {
            return;
        };

        let order = self.reconciler.canonical_order().to_vec();
        if let Err(e) = publisher.publish(&order).await {
            warn!(error = %e, "reorder rejected, reloading previous order");
            self.reconciler.reload(previous).await;
        }
    }
}

impl<K, T, F, S> ReconcileService<K, T, F, S>
where
    K: ItemId,
    T: Send + 'static,
    F: ItemFetcher<K, T> + 'static,
    S: ChangeSink<K, T> + 'static,
{
    /// Spawns the service on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<Reconciler<K, T, F, S>> {
        tokio::spawn(self.run())
    }
}

/// Builds a service around `reconciler` and spawns it.
pub fn spawn<K, T, F, S>(
    reconciler: Reconciler<K, T, F, S>,
) -> (ServiceHandle<K, T>, JoinHandle<Reconciler<K, T, F, S>>)
where
    K: ItemId,
    T: Send + 'static,
    F: ItemFetcher<K, T> + 'static,
    S: ChangeSink<K, T> + 'static,
{
    let (service, handle) = ReconcileService::new(reconciler);
    (handle, service.spawn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;
    use crate::error::PublishError;
    use crate::memory::{MemoryFetcher, RecordingSink};
    use crate::store::EntryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::time::Duration;

    fn reconciler(
        known: &[&'static str],
    ) -> Reconciler<&'static str, String, MemoryFetcher<&'static str, String>, RecordingSink<&'static str>>
    {
        let fetcher = MemoryFetcher::with_items(known.iter().map(|id| (*id, id.to_uppercase())));
        Reconciler::new(fetcher, RecordingSink::new())
    }

    struct Rejecting;

    #[async_trait]
    impl ReorderPublisher<&'static str> for Rejecting {
        async fn publish(&self, _order: &[&'static str]) -> Result<(), PublishError> {
            Err(PublishError::rejected("premium required"))
        }
    }

    /// Counts changes through a `Cell`: `Send` but not `Sync`.
    #[derive(Default)]
    struct CountingSink {
        changes: Cell<usize>,
    }

    impl ChangeSink<&'static str, String> for CountingSink {
        fn on_change(&mut self, _change: &Change<&'static str>, _store: &EntryStore<&'static str, String>) {
            self.changes.set(self.changes.get() + 1);
        }
    }

    #[tokio::test]
    async fn test_spawns_with_non_sync_sink() {
        let fetcher = MemoryFetcher::with_items(vec![("a", "A".to_string())]);
        let (handle, task) = spawn(Reconciler::new(fetcher, CountingSink::default()));

        handle.submit(vec!["a"]).unwrap();
        handle.submit(vec![]).unwrap();
        handle.shutdown().unwrap();

        let reconciler = task.await.unwrap();
        assert!(reconciler.store().is_empty());
        assert_eq!(reconciler.sink().changes.get(), 2);
    }

    #[tokio::test]
    async fn test_submit_then_shutdown() {
        let (handle, task) = spawn(reconciler(&["a", "b", "c"]));

        handle.submit(vec!["a", "b"]).unwrap();
        handle.submit(vec!["a", "b", "c"]).unwrap();
        handle.shutdown().unwrap();

        let reconciler = task.await.unwrap();
        assert_eq!(reconciler.store().order(), vec!["a", "b", "c"]);
        assert!(handle.is_closed());
        assert_eq!(handle.submit(vec![]), Err(ServiceError::Closed));
    }

    #[tokio::test]
    async fn test_edits_after_reconcile() {
        let (handle, task) = spawn(reconciler(&["a", "b", "c"]));

        handle.submit(vec!["a", "b", "c"]).unwrap();
        handle.remove("b").unwrap();
        handle.insert(0, "z", "Z".to_string()).unwrap();
        handle.move_item(0, 2).unwrap();
        handle.shutdown().unwrap();

        let reconciler = task.await.unwrap();
        assert_eq!(reconciler.store().order(), vec!["a", "c", "z"]);
        assert_eq!(reconciler.canonical_order(), &["a", "c", "z"]);
    }

    #[tokio::test]
    async fn test_rejected_reorder_reloads_previous_order() {
        let (service, handle) = ReconcileService::new(reconciler(&["a", "b", "c"]));
        let task = service.with_publisher(Rejecting).spawn();

        handle.submit(vec!["a", "b", "c"]).unwrap();
        handle.move_item(0, 2).unwrap();
        handle.shutdown().unwrap();

        let reconciler = task.await.unwrap();
        assert_eq!(reconciler.store().order(), vec!["a", "b", "c"]);
        assert_eq!(
            reconciler.sink().changes(),
            &[
                Change::ReplaceAll { len: 3 },
                Change::Move { from: 0, to: 2, id: "a" },
                Change::ReplaceAll { len: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_onto_itself_is_not_published() {
        let reconciler = reconciler(&["a", "b", "x"]);
        reconciler.fetcher().fail("x");
        let (service, handle) = ReconcileService::new(reconciler);
        let task = service.with_publisher(Rejecting).spawn();

        handle.submit(vec!["a", "b", "x"]).unwrap();
        handle.move_item(1, 1).unwrap();
        handle.shutdown().unwrap();

        let reconciler = task.await.unwrap();
        assert_eq!(reconciler.canonical_order(), &["a", "b", "x"]);
        assert_eq!(
            reconciler.sink().changes(),
            &[Change::ReplaceAll { len: 2 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_reconcile() {
        let fetcher = MemoryFetcher::with_items(vec![("a", "A".to_string()), ("b", "B".to_string())])
            .with_delay(Duration::from_secs(60));
        let config = crate::ReconcilerConfig::default()
            .with_fetch_timeout(None)
            .with_initial_load_in_bulk(false);
        let (handle, task) = spawn(Reconciler::with_config(config, fetcher, RecordingSink::new()));

        handle.submit(vec!["a", "b"]).unwrap();
        tokio::time::sleep(Duration::from_secs(90)).await;
        handle.cancel();

        let reconciler = task.await.unwrap();
        assert_eq!(reconciler.store().order(), vec!["a"]);
    }
}
