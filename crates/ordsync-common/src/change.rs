//! Change notifications emitted to the UI-side consumer.

use crate::error::FetchError;
use crate::store::EntryStore;
use serde::Serialize;

/// A single structural change applied to the [`EntryStore`].
///
/// Indices refer to the store state just before (for `Remove` and the
/// `from` of `Move`) or just after (`Insert`, the `to` of `Move`) the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change<K> {
    /// The entry at `index` was removed
    Remove {
        /// Former position
        index: usize,
        /// The removed id
        id: K,
    },
    /// The entry at `from` now sits at `to`
    Move {
        /// Former position
        from: usize,
        /// New position
        to: usize,
        /// The moved id
        id: K,
    },
    /// A new entry was inserted at `index`
    Insert {
        /// New position
        index: usize,
        /// The inserted id
        id: K,
    },
    /// The whole collection was replaced; it now holds `len` entries
    ReplaceAll {
        /// New length
        len: usize,
    },
}

impl<K> Change<K> {
    /// Returns a short name of the operation.
    pub fn op_name(&self) -> &'static str {
        match self {
            Change::Remove { .. } => "remove",
            Change::Move { .. } => "move",
            Change::Insert { .. } => "insert",
            Change::ReplaceAll { .. } => "replace_all",
        }
    }

    /// Returns true if this is a `Remove`.
    pub fn is_remove(&self) -> bool {
        matches!(self, Change::Remove { .. })
    }

    /// Returns true if this is an `Insert`.
    pub fn is_insert(&self) -> bool {
        matches!(self, Change::Insert { .. })
    }
}

/// Receiver of change notifications.
///
/// The store is passed by shared reference after the change has been
/// applied, so a consumer can read the affected payload. It must not keep
/// any reference beyond the call; notifications are the only legitimate way
/// to learn that the store changed.
pub trait ChangeSink<K, T>: Send {
    /// Called once per structural change, in emission order.
    fn on_change(&mut self, change: &Change<K>, store: &EntryStore<K, T>);

    /// Called when fetching a single id failed; the id stays absent.
    fn on_fetch_failed(&mut self, _id: &K, _error: &FetchError) {
        // Default: no-op
    }

    /// Called when a full reload could not fetch the collection at all.
    fn on_reload_failed(&mut self, _error: &FetchError) {
        // Default: no-op
    }
}

impl<K, T, S> ChangeSink<K, T> for Box<S>
where
    S: ChangeSink<K, T> + ?Sized,
{
    fn on_change(&mut self, change: &Change<K>, store: &EntryStore<K, T>) {
        (**self).on_change(change, store)
    }

    fn on_fetch_failed(&mut self, id: &K, error: &FetchError) {
        (**self).on_fetch_failed(id, error)
    }

    fn on_reload_failed(&mut self, error: &FetchError) {
        (**self).on_reload_failed(error)
    }
}
