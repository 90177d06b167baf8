//! Incremental ordered-collection reconciler.
//!
//! # Algorithm
//!
//! 1. Short-circuit if the store already matches the order
//! 2. Classify the order ([`ReconcilePlan::classify`]); unsupported shapes
//!    fall back to a full reload
//! 3. Remove ids absent from the order, highest index first
//! 4. Move kept ids, ascending target position
//! 5. Fetch new ids one at a time, in target order, inserting each as soon
//!    as it arrives; a failed fetch leaves its id absent and does not stop
//!    the remaining fetches
//!
//! Change notifications follow the same order: removals, moves, insertions.

use crate::change::{Change, ChangeSink};
use crate::config::ReconcilerConfig;
use crate::error::{FetchError, StoreError};
use crate::fetch::ItemFetcher;
use crate::plan::ReconcilePlan;
use crate::status::{ReconcileReport, ReconcileStatus, ReloadReason};
use crate::store::{EntryStore, ItemId};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns the entry store and keeps it in line with canonical orders.
///
/// Only the reconciler mutates the store. Readers get `&EntryStore` through
/// [`store`](Self::store) or inside [`ChangeSink`] callbacks.
pub struct Reconciler<K, T, F, S> {
    config: ReconcilerConfig,
    store: EntryStore<K, T>,
    fetcher: F,
    sink: S,
    /// Last order reconciled to (or locally edited to)
    canonical: Vec<K>,
}

impl<K, T, F, S> Reconciler<K, T, F, S>
where
    K: ItemId,
    T: Send + 'static,
    F: ItemFetcher<K, T>,
    S: ChangeSink<K, T>,
{
    /// Creates a reconciler with the default configuration.
    pub fn new(fetcher: F, sink: S) -> Self {
        Self::with_config(ReconcilerConfig::default(), fetcher, sink)
    }

    /// Creates a reconciler with the given configuration.
    pub fn with_config(config: ReconcilerConfig, fetcher: F, sink: S) -> Self {
        Self {
            config,
            store: EntryStore::new(),
            fetcher,
            sink,
            canonical: Vec::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Returns the entry store (read-only).
    pub fn store(&self) -> &EntryStore<K, T> {
        &self.store
    }

    /// Returns the fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns the change sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the change sink mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Returns the last order the collection was reconciled to.
    ///
    /// Ids whose fetch failed are part of this order but absent from the store.
    pub fn canonical_order(&self) -> &[K] {
        &self.canonical
    }

    /// Tears the reconciler down, dropping the store.
    pub fn into_parts(self) -> (F, S) {
        (self.fetcher, self.sink)
    }

    /// Brings the store into agreement with `order`.
    ///
    /// Never fails: structural problems degrade to a full reload, and
    /// per-item fetch failures are reported to the sink and in the report.
    pub async fn reconcile(&mut self, order: Vec<K>) -> ReconcileReport {
        if self.store.matches_order(&order) {
            debug!(len = order.len(), "order unchanged");
            self.canonical = order;
            return ReconcileReport::unchanged();
        }

        let plan = ReconcilePlan::classify(&self.store, &order, self.config.initial_load_in_bulk);
        match plan {
            Ok(plan) => self.apply(order, plan).await,
            Err(reason) => self.full_reload(order, reason).await,
        }
    }

    /// Replaces the store with a bulk fetch of `order`.
    pub async fn reload(&mut self, order: Vec<K>) -> ReconcileReport {
        self.full_reload(order, ReloadReason::Requested).await
    }

    async fn apply(&mut self, order: Vec<K>, plan: ReconcilePlan<K>) -> ReconcileReport {
        debug!(
            removals = plan.removals.len(),
            to_fetch = plan.to_fetch.len(),
            insert_only = plan.is_insert_only(),
            "applying plan"
        );
        let mut report = ReconcileReport::new(ReconcileStatus::Applied);

        for &index in &plan.removals {
            match self.store.remove_at(index) {
                Ok(entry) => {
                    self.emit(Change::Remove { index, id: entry.id });
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "removal no longer valid");
                    return self.full_reload(order, ReloadReason::Vanished).await;
                }
            }
        }

        for (target, id) in plan.kept.iter().enumerate() {
            let Some(current) = self.store.index_of(id) else {
                warn!(id = ?id, "kept id vanished from store");
                return self.full_reload(order, ReloadReason::Vanished).await;
            };
            if current == target {
                continue;
            }
            if let Err(e) = self.store.move_to(current, target) {
                warn!(error = %e, "move no longer valid");
                return self.full_reload(order, ReloadReason::Vanished).await;
            }
            self.emit(Change::Move {
                from: current,
                to: target,
                id: id.clone(),
            });
            report.moved += 1;
        }

        let mut at = plan.insert_at;
        for id in plan.to_fetch {
            match fetch_one(&self.fetcher, self.config.fetch_timeout(), &id).await {
                Ok(payload) => match self.store.insert_at(at, id.clone(), payload) {
                    Ok(()) => {
                        self.emit(Change::Insert { index: at, id });
                        report.inserted += 1;
                        at += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "fetched id could not be inserted");
                        let reason = match e {
                            StoreError::DuplicateId { .. } => ReloadReason::DuplicateOnInsert,
                            StoreError::IndexOutOfRange { .. } => ReloadReason::Vanished,
                        };
                        return self.full_reload(order, reason).await;
                    }
                },
                Err(e) => {
                    warn!(id = ?id, error = %e, "fetch failed, leaving id absent");
                    self.sink.on_fetch_failed(&id, &e);
                    report.failed.push(format!("{:?}", id));
                }
            }
        }

        debug!(
            removed = report.removed,
            moved = report.moved,
            inserted = report.inserted,
            failed = report.failed.len(),
            "order applied incrementally"
        );
        self.canonical = order;
        report
    }

    async fn full_reload(&mut self, order: Vec<K>, reason: ReloadReason) -> ReconcileReport {
        let order = dedup(order);
        info!(reason = %reason, len = order.len(), "full reload");

        let payloads = match fetch_bulk(&self.fetcher, self.config.fetch_timeout(), &order).await {
            Ok(payloads) => payloads,
            Err(e) => {
                warn!(reason = %reason, error = %e, "full reload failed");
                self.sink.on_reload_failed(&e);
                return ReconcileReport::new(ReconcileStatus::ReloadFailed).with_reason(reason);
            }
        };

        let mut payloads = payloads.into_iter();
        let mut entries = Vec::with_capacity(order.len());
        let mut missing = Vec::new();
        for id in &order {
            match payloads.next().flatten() {
                Some(payload) => entries.push((id.clone(), payload)),
                None => missing.push(id.clone()),
            }
        }

        self.store.replace_all(entries);
        let mut report = ReconcileReport::new(ReconcileStatus::Reloaded).with_reason(reason);
        report.inserted = self.store.len();
        self.emit(Change::ReplaceAll {
            len: self.store.len(),
        });

        for id in missing {
            let e = FetchError::missing(&id);
            warn!(id = ?id, "item missing from full reload");
            self.sink.on_fetch_failed(&id, &e);
            report.failed.push(format!("{:?}", id));
        }

        self.canonical = order;
        report
    }

    /// Removes a single id outside of a canonical order push.
    ///
    /// Returns the removed payload, or `None` if the id was not present.
    pub fn remove_item(&mut self, id: &K) -> Option<T> {
        let index = self.store.index_of(id)?;
        let entry = self.store.remove_at(index).ok()?;
        self.canonical.retain(|k| k != id);
        self.emit(Change::Remove {
            index,
            id: entry.id,
        });
        Some(entry.payload)
    }

    /// Inserts an item whose payload is already known.
    ///
    /// `index` is clamped to the store length. Returns the actual index.
    pub fn insert_item(&mut self, index: usize, id: K, payload: T) -> Result<usize, StoreError> {
        let index = index.min(self.store.len());
        self.store.insert_at(index, id.clone(), payload)?;
        self.place_in_canonical(index);
        self.emit(Change::Insert { index, id });
        Ok(index)
    }

    /// Applies a local (drag and drop) move.
    ///
    /// The canonical order follows the new local order; the previous one is
    /// returned so the caller can roll back if the remote side rejects it.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<Vec<K>, StoreError> {
        self.store.move_to(from, to)?;
        let previous = self.canonical.clone();
        if from == to {
            return Ok(previous);
        }
        if let Some(id) = self.store.get(to).map(|e| e.id.clone()) {
            self.place_in_canonical(to);
            self.emit(Change::Move { from, to, id });
        }
        Ok(previous)
    }

    /// Puts the id stored at `index` into the canonical order right after
    /// its store predecessor. Ids absent from the store keep their slots.
    fn place_in_canonical(&mut self, index: usize) {
        let Some(id) = self.store.get(index).map(|e| e.id.clone()) else {
            return;
        };
        self.canonical.retain(|k| *k != id);
        let at = match index.checked_sub(1).and_then(|i| self.store.get(i)) {
            Some(before) => self
                .canonical
                .iter()
                .position(|k| *k == before.id)
                .map_or(self.canonical.len(), |i| i + 1),
            None => 0,
        };
        self.canonical.insert(at, id);
    }

    fn emit(&mut self, change: Change<K>) {
        self.sink.on_change(&change, &self.store);
    }
}

async fn fetch_one<K, T, F>(fetcher: &F, timeout: Option<Duration>, id: &K) -> Result<T, FetchError>
where
    K: ItemId,
    T: Send + 'static,
    F: ItemFetcher<K, T>,
{
    match timeout {
        Some(after) => tokio::time::timeout(after, fetcher.fetch(id))
            .await
            .unwrap_or(Err(FetchError::Timeout { after })),
        None => fetcher.fetch(id).await,
    }
}

/// Bulk fetch bounded by the per-item timeout times the order length.
async fn fetch_bulk<K, T, F>(
    fetcher: &F,
    timeout: Option<Duration>,
    order: &[K],
) -> Result<Vec<Option<T>>, FetchError>
where
    K: ItemId,
    T: Send + 'static,
    F: ItemFetcher<K, T>,
{
    match timeout {
        Some(per_item) => {
            let after = per_item.saturating_mul(order.len().max(1) as u32);
            tokio::time::timeout(after, fetcher.fetch_all(order))
                .await
                .unwrap_or(Err(FetchError::Timeout { after }))
        }
        None => fetcher.fetch_all(order).await,
    }
}

fn dedup<K: ItemId>(order: Vec<K>) -> Vec<K> {
    let mut seen = HashSet::with_capacity(order.len());
    let len = order.len();
    let order: Vec<K> = order.into_iter().filter(|id| seen.insert(id.clone())).collect();
    if order.len() != len {
        warn!(dropped = len - order.len(), "duplicate ids dropped from order");
    }
    order
}
