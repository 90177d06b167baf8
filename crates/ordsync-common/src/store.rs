//! Ordered entry store with an id side index.
//!
//! `EntryStore` is the locally materialized ordered collection. Entries are
//! kept in a `Vec` (position = index) and a `HashMap<K, usize>` side index
//! maps each id to its position. Every structural mutation updates the side
//! index in lockstep; a stale side index is a correctness bug, so the store
//! never hands out mutable access to ids or positions.
//!
//! Like a map that refuses to auto-vivify, nothing here creates an entry
//! implicitly:
//! - `index_of()` returns `Option<usize>`
//! - `insert_at()` returns `Err(DuplicateId)` instead of overwriting
//! - `remove_at()` / `move_to()` return `Err(IndexOutOfRange)` for bad indices

use crate::error::StoreError;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Identifier of an entry in the collection.
///
/// Ids are opaque: the reconciler only compares and hashes them.
pub trait ItemId: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<K> ItemId for K where K: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// A live entry: id plus payload. Its position is its index in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<K, T> {
    /// The entry id (unique within the store)
    pub id: K,
    /// The materialized payload
    pub payload: T,
}

/// Index-addressed ordered collection with O(1) id lookup.
#[derive(Debug, Clone)]
pub struct EntryStore<K, T> {
    entries: Vec<Entry<K, T>>,
    index: HashMap<K, usize>,
}

impl<K, T> EntryStore<K, T>
where
    K: ItemId,
{
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the position of `id`, or `None` if it is not present.
    pub fn index_of(&self, id: &K) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Returns true if the store contains `id`.
    pub fn contains(&self, id: &K) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: usize) -> Option<&Entry<K, T>> {
        self.entries.get(index)
    }

    /// Returns the payload stored for `id`.
    pub fn payload(&self, id: &K) -> Option<&T> {
        self.index_of(id).map(|i| &self.entries[i].payload)
    }

    /// Returns an iterator over entries in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry<K, T>> {
        self.entries.iter()
    }

    /// Returns an iterator over ids in position order.
    pub fn ids(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|e| &e.id)
    }

    /// Returns the ids in position order as an owned vector.
    pub fn order(&self) -> Vec<K> {
        self.ids().cloned().collect()
    }

    /// Returns true if the ids, read in position order, equal `order`.
    pub fn matches_order(&self, order: &[K]) -> bool {
        self.entries.len() == order.len() && self.ids().zip(order).all(|(a, b)| a == b)
    }

    /// Inserts an entry at `index`, shifting later entries up by one.
    ///
    /// `index == len()` appends.
    pub fn insert_at(&mut self, index: usize, id: K, payload: T) -> Result<(), StoreError> {
        if self.index.contains_key(&id) {
            return Err(StoreError::duplicate_id(&id));
        }
        if index > self.entries.len() {
            return Err(StoreError::out_of_range(index, self.entries.len()));
        }

        self.index.insert(id.clone(), index);
        self.entries.insert(index, Entry { id, payload });
        self.reindex(index + 1, self.entries.len());
        Ok(())
    }

    /// Appends an entry at the end.
    pub fn push(&mut self, id: K, payload: T) -> Result<(), StoreError> {
        self.insert_at(self.entries.len(), id, payload)
    }

    /// Removes and returns the entry at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<Entry<K, T>, StoreError> {
        if index >= self.entries.len() {
            return Err(StoreError::out_of_range(index, self.entries.len()));
        }

        let entry = self.entries.remove(index);
        self.index.remove(&entry.id);
        self.reindex(index, self.entries.len());
        Ok(entry)
    }

    /// Moves the entry at `from` so that it ends up at `to`.
    ///
    /// No-op if `from == to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        let len = self.entries.len();
        if from >= len {
            return Err(StoreError::out_of_range(from, len));
        }
        if to >= len {
            return Err(StoreError::out_of_range(to, len));
        }
        if from == to {
            return Ok(());
        }

        if from < to {
            self.entries[from..=to].rotate_left(1);
        } else {
            self.entries[to..=from].rotate_right(1);
        }
        self.reindex(from.min(to), from.max(to) + 1);
        Ok(())
    }

    /// Replaces the whole contents with `entries`.
    ///
    /// Later duplicates of an id are dropped; returns how many were dropped.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = (K, T)>) -> usize {
        self.entries.clear();
        self.index.clear();

        let mut dropped = 0;
        for (id, payload) in entries {
            if self.index.contains_key(&id) {
                dropped += 1;
                continue;
            }
            self.index.insert(id.clone(), self.entries.len());
            self.entries.push(Entry { id, payload });
        }
        dropped
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Returns true if the side index agrees with the entry vector.
    pub fn is_consistent(&self) -> bool {
        if self.index.len() != self.entries.len() {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries
            .iter()
            .enumerate()
            .all(|(i, e)| seen.insert(&e.id) && self.index.get(&e.id) == Some(&i))
    }

    fn reindex(&mut self, start: usize, end: usize) {
        for (offset, entry) in self.entries[start..end].iter().enumerate() {
            if let Some(slot) = self.index.get_mut(&entry.id) {
                *slot = start + offset;
            }
        }
    }
}

impl<K, T> Default for EntryStore<K, T>
where
    K: ItemId,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> FromIterator<(K, T)> for EntryStore<K, T>
where
    K: ItemId,
{
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut store = Self::new();
        store.replace_all(iter);
        store
    }
}
