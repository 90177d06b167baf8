//! In-memory collaborators: a map-backed fetcher and a recording sink.
//!
//! Both are useful on their own (demo screens, replay) and are the building
//! blocks of the test fixtures.

use crate::change::{Change, ChangeSink};
use crate::error::FetchError;
use crate::fetch::ItemFetcher;
use crate::store::{EntryStore, ItemId};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// `ItemFetcher` backed by a concurrent map.
///
/// Ids can be forced to fail with [`fail`](Self::fail), and the bulk path can
/// be switched off to simulate an unreachable source. Single fetches are
/// logged in call order.
#[derive(Debug)]
pub struct MemoryFetcher<K, T>
where
    K: ItemId,
{
    items: DashMap<K, T>,
    failing: DashSet<K>,
    delay: Option<Duration>,
    bulk_available: AtomicBool,
    fetched: Mutex<Vec<K>>,
}

impl<K, T> MemoryFetcher<K, T>
where
    K: ItemId,
{
    /// Creates an empty fetcher.
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            failing: DashSet::new(),
            delay: None,
            bulk_available: AtomicBool::new(true),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Creates a fetcher pre-populated with `items`.
    pub fn with_items(items: impl IntoIterator<Item = (K, T)>) -> Self {
        let fetcher = Self::new();
        for (id, payload) in items {
            fetcher.items.insert(id, payload);
        }
        fetcher
    }

    /// Delays every single fetch by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Adds or replaces an item.
    pub fn insert(&self, id: K, payload: T) {
        self.items.insert(id, payload);
    }

    /// Removes an item; later fetches for it return `NotFound`.
    pub fn remove(&self, id: &K) -> Option<T> {
        self.items.remove(id).map(|(_, payload)| payload)
    }

    /// Makes fetches for `id` fail with `Unavailable`.
    pub fn fail(&self, id: K) {
        self.failing.insert(id);
    }

    /// Undoes [`fail`](Self::fail).
    pub fn recover(&self, id: &K) {
        self.failing.remove(id);
    }

    /// Switches the bulk (`fetch_all`) path on or off.
    pub fn set_bulk_available(&self, available: bool) {
        self.bulk_available.store(available, Ordering::SeqCst);
    }

    /// Returns the ids passed to single fetches, in call order.
    pub async fn fetched(&self) -> Vec<K> {
        self.fetched.lock().await.clone()
    }

    fn lookup(&self, id: &K) -> Result<T, FetchError>
    where
        T: Clone,
    {
        if self.failing.contains(id) {
            return Err(FetchError::unavailable(format!("forced failure for {:?}", id)));
        }
        self.items
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FetchError::not_found(id))
    }
}

impl<K, T> Default for MemoryFetcher<K, T>
where
    K: ItemId,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, T> ItemFetcher<K, T> for MemoryFetcher<K, T>
where
    K: ItemId,
    T: Clone + Send + Sync + 'static,
{
    async fn fetch(&self, id: &K) -> Result<T, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.fetched.lock().await.push(id.clone());
        self.lookup(id)
    }

    async fn fetch_all(&self, order: &[K]) -> Result<Vec<Option<T>>, FetchError> {
        if !self.bulk_available.load(Ordering::SeqCst) {
            return Err(FetchError::unavailable("bulk source offline"));
        }
        Ok(order.iter().map(|id| self.lookup(id).ok()).collect())
    }
}

/// `ChangeSink` that records everything it is told.
#[derive(Debug, Clone)]
pub struct RecordingSink<K> {
    changes: Vec<Change<K>>,
    failures: Vec<(K, FetchError)>,
    reload_failures: Vec<FetchError>,
    snapshots: Option<Vec<Vec<K>>>,
}

impl<K> RecordingSink<K>
where
    K: ItemId,
{
    /// Creates a sink that records changes and failures.
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            failures: Vec::new(),
            reload_failures: Vec::new(),
            snapshots: None,
        }
    }

    /// Also records the id order after every change.
    pub fn with_snapshots(mut self) -> Self {
        self.snapshots = Some(Vec::new());
        self
    }

    /// Recorded changes, in emission order.
    pub fn changes(&self) -> &[Change<K>] {
        &self.changes
    }

    /// Recorded per-item fetch failures.
    pub fn failures(&self) -> &[(K, FetchError)] {
        &self.failures
    }

    /// Ids of recorded fetch failures.
    pub fn failed_ids(&self) -> Vec<K> {
        self.failures.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Recorded bulk reload failures.
    pub fn reload_failures(&self) -> &[FetchError] {
        &self.reload_failures
    }

    /// Id orders observed after each change (empty unless enabled).
    pub fn snapshots(&self) -> &[Vec<K>] {
        self.snapshots.as_deref().unwrap_or(&[])
    }

    /// Takes the recorded changes, leaving the list empty.
    pub fn take_changes(&mut self) -> Vec<Change<K>> {
        std::mem::take(&mut self.changes)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&mut self) {
        self.changes.clear();
        self.failures.clear();
        self.reload_failures.clear();
        if let Some(snapshots) = &mut self.snapshots {
            snapshots.clear();
        }
    }
}

impl<K> Default for RecordingSink<K>
where
    K: ItemId,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> ChangeSink<K, T> for RecordingSink<K>
where
    K: ItemId,
{
    fn on_change(&mut self, change: &Change<K>, store: &EntryStore<K, T>) {
        self.changes.push(change.clone());
        if let Some(snapshots) = &mut self.snapshots {
            snapshots.push(store.order());
        }
    }

    fn on_fetch_failed(&mut self, id: &K, error: &FetchError) {
        self.failures.push((id.clone(), error.clone()));
    }

    fn on_reload_failed(&mut self, error: &FetchError) {
        self.reload_failures.push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_memory_fetcher_lookup() {
        let fetcher = MemoryFetcher::with_items(vec![(1u32, "one"), (2, "two")]);

        assert_eq!(fetcher.fetch(&1).await, Ok("one"));
        assert_eq!(fetcher.fetch(&3).await, Err(FetchError::not_found(&3u32)));

        fetcher.fail(2);
        assert!(fetcher.fetch(&2).await.unwrap_err().is_retryable());
        fetcher.recover(&2);
        assert_eq!(fetcher.fetch(&2).await, Ok("two"));

        assert_eq!(fetcher.fetched().await, vec![1, 3, 2, 2]);
    }

    #[tokio::test]
    async fn test_memory_fetcher_bulk() {
        let fetcher = MemoryFetcher::with_items(vec![(1u32, "one"), (2, "two")]);

        let payloads = fetcher.fetch_all(&[2, 9, 1]).await.unwrap();
        assert_eq!(payloads, vec![Some("two"), None, Some("one")]);
        assert!(fetcher.fetched().await.is_empty());

        fetcher.set_bulk_available(false);
        assert!(fetcher.fetch_all(&[1]).await.is_err());
    }

    #[test]
    fn test_recording_sink_snapshots() {
        let mut store: EntryStore<&str, ()> = EntryStore::new();
        let mut sink = RecordingSink::new().with_snapshots();

        store.push("a", ()).unwrap();
        sink.on_change(&Change::Insert { index: 0, id: "a" }, &store);
        store.push("b", ()).unwrap();
        sink.on_change(&Change::Insert { index: 1, id: "b" }, &store);

        assert_eq!(sink.changes().len(), 2);
        assert_eq!(sink.snapshots(), &[vec!["a"], vec!["a", "b"]]);

        sink.clear();
        assert!(sink.changes().is_empty());
        assert!(sink.snapshots().is_empty());
    }
}
