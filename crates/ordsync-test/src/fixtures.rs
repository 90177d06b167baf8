//! Test fixtures for reconciler scenarios
//!
//! Provides gated fetchers, mirroring sinks and seeded order generators

use async_trait::async_trait;
use ordsync_common::{
    Change, ChangeSink, EntryStore, FetchError, ItemFetcher, ItemId, MemoryFetcher,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tracing::debug;

/// Builds a fetcher knowing ids `0..count`, with payload `"item-{id}"`
pub fn numbered_catalogue(count: u32) -> MemoryFetcher<u32, String> {
    MemoryFetcher::with_items((0..count).map(|id| (id, format!("item-{}", id))))
}

/// Builds a fetcher knowing the given string ids, payload is the upper-cased id
pub fn named_catalogue(ids: &[&'static str]) -> MemoryFetcher<&'static str, String> {
    MemoryFetcher::with_items(ids.iter().map(|id| (*id, id.to_uppercase())))
}

/// Installs a test-friendly tracing subscriber (idempotent)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Controls a [`GatedFetcher`]
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl Gate {
    /// Lets `n` more single fetches through
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    /// Lets every future fetch through
    pub fn open(&self) {
        self.permits.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Waits until a single fetch has reached the gate
    pub async fn entered(&self) {
        self.entered.notified().await;
    }
}

/// Fetcher whose single fetches block until the [`Gate`] lets them through
///
/// Bulk fetches are not gated, so an initial load completes immediately.
pub struct GatedFetcher<K, T>
where
    K: ItemId,
{
    inner: MemoryFetcher<K, T>,
    permits: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl<K, T> GatedFetcher<K, T>
where
    K: ItemId,
{
    /// Wraps `inner`; the gate starts closed
    pub fn new(inner: MemoryFetcher<K, T>) -> (Self, Gate) {
        let permits = Arc::new(Semaphore::new(0));
        let entered = Arc::new(Notify::new());
        let gate = Gate {
            permits: Arc::clone(&permits),
            entered: Arc::clone(&entered),
        };
        (
            Self {
                inner,
                permits,
                entered,
            },
            gate,
        )
    }

    /// Returns the wrapped fetcher
    pub fn inner(&self) -> &MemoryFetcher<K, T> {
        &self.inner
    }
}

#[async_trait]
impl<K, T> ItemFetcher<K, T> for GatedFetcher<K, T>
where
    K: ItemId,
    T: Clone + Send + Sync + 'static,
{
    async fn fetch(&self, id: &K) -> Result<T, FetchError> {
        debug!(id = ?id, "fetch waiting at gate");
        self.entered.notify_one();
        match self.permits.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return Err(FetchError::unavailable("gate closed")),
        }
        self.inner.fetch(id).await
    }

    async fn fetch_all(&self, order: &[K]) -> Result<Vec<Option<T>>, FetchError> {
        self.inner.fetch_all(order).await
    }
}

/// Sink that replays every change onto its own id list, like a list adapter
///
/// `Remove` and `Move` are checked against the mirrored id at the reported
/// index; any disagreement is recorded as a violation. `ReplaceAll` re-reads
/// the store.
#[derive(Debug, Clone, Default)]
pub struct MirrorSink<K> {
    mirror: Vec<K>,
    violations: Vec<String>,
    changes: usize,
    failed: Vec<K>,
}

impl<K> MirrorSink<K>
where
    K: ItemId,
{
    /// Creates an empty mirror
    pub fn new() -> Self {
        Self {
            mirror: Vec::new(),
            violations: Vec::new(),
            changes: 0,
            failed: Vec::new(),
        }
    }

    /// The mirrored id order
    pub fn mirror(&self) -> &[K] {
        &self.mirror
    }

    /// Index mismatches seen so far
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Number of changes received
    pub fn change_count(&self) -> usize {
        self.changes
    }

    /// Ids reported as failed
    pub fn failed(&self) -> &[K] {
        &self.failed
    }

    /// Resets the change counter and failure list
    pub fn reset_counters(&mut self) {
        self.changes = 0;
        self.failed.clear();
    }

    fn check(&mut self, index: usize, id: &K, op: &str) -> bool {
        match self.mirror.get(index) {
            Some(actual) if actual == id => true,
            actual => {
                self.violations
                    .push(format!("{} {:?} at {}: mirror has {:?}", op, id, index, actual));
                false
            }
        }
    }
}

impl<K, T> ChangeSink<K, T> for MirrorSink<K>
where
    K: ItemId,
{
    fn on_change(&mut self, change: &Change<K>, store: &EntryStore<K, T>) {
        self.changes += 1;
        match change {
            Change::Remove { index, id } => {
                if self.check(*index, id, "remove") {
                    self.mirror.remove(*index);
                }
            }
            Change::Move { from, to, id } => {
                if self.check(*from, id, "move") {
                    let moved = self.mirror.remove(*from);
                    let to = (*to).min(self.mirror.len());
                    self.mirror.insert(to, moved);
                }
            }
            Change::Insert { index, id } => {
                if *index <= self.mirror.len() {
                    self.mirror.insert(*index, id.clone());
                } else {
                    self.violations
                        .push(format!("insert {:?} at {} beyond {}", id, index, self.mirror.len()));
                }
            }
            Change::ReplaceAll { .. } => {
                self.mirror = store.order();
            }
        }
    }

    fn on_fetch_failed(&mut self, id: &K, _error: &FetchError) {
        self.failed.push(id.clone());
    }
}

/// Deterministic random number generator for property tests
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random order over ids `0..universe`, any shape
pub fn random_order(rng: &mut StdRng, universe: u32) -> Vec<u32> {
    let mut ids: Vec<u32> = (0..universe).filter(|_| rng.gen_bool(0.6)).collect();
    ids.shuffle(rng);
    ids
}

/// Derives an order of the incremental shape from `current`
///
/// Some ids are removed, the rest keep their relative order, and a run of
/// up to `max_new` ids taken from `fresh` is inserted at one random point.
pub fn contiguous_insertion(
    rng: &mut StdRng,
    current: &[u32],
    fresh: &mut impl Iterator<Item = u32>,
    max_new: usize,
) -> Vec<u32> {
    let mut order: Vec<u32> = current
        .iter()
        .copied()
        .filter(|_| rng.gen_bool(0.8))
        .collect();
    let run: Vec<u32> = fresh.take(rng.gen_range(0..=max_new)).collect();
    let at = rng.gen_range(0..=order.len());
    order.splice(at..at, run);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_insertion_shape() {
        let mut rng = seeded_rng(7);
        let current: Vec<u32> = (0..10).collect();
        let mut fresh = 100..;

        for _ in 0..50 {
            let order = contiguous_insertion(&mut rng, &current, &mut fresh, 3);
            let new_positions: Vec<usize> = order
                .iter()
                .enumerate()
                .filter(|(_, id)| **id >= 100)
                .map(|(i, _)| i)
                .collect();
            assert!(new_positions.windows(2).all(|w| w[1] == w[0] + 1));

            let kept: Vec<u32> = order.iter().copied().filter(|id| *id < 100).collect();
            assert!(kept.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_random_order_has_no_duplicates() {
        let mut rng = seeded_rng(11);
        for _ in 0..50 {
            let mut order = random_order(&mut rng, 20);
            let len = order.len();
            order.sort_unstable();
            order.dedup();
            assert_eq!(order.len(), len);
        }
    }
}
