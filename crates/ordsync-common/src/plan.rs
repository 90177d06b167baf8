//! Classification pass of a reconcile call.
//!
//! A plan is only produced for orders of the shape "the current kept order,
//! minus removed ids, plus one contiguous run of new ids at a single point".
//! Reordering kept ids is allowed only when nothing is inserted. Every other
//! shape yields the [`ReloadReason`] that forces a full reload.

use crate::status::ReloadReason;
use crate::store::{EntryStore, ItemId};
use std::collections::HashSet;

/// Incremental steps needed to turn the store into a target order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan<K> {
    /// Store indices to remove, highest first
    pub removals: Vec<usize>,
    /// Ids that stay, in target order; the i-th one ends up at index i
    pub kept: Vec<K>,
    /// Target position of the first new id
    pub insert_at: usize,
    /// New ids to fetch, in target order
    pub to_fetch: Vec<K>,
}

impl<K> ReconcilePlan<K>
where
    K: ItemId,
{
    /// Classifies `order` against the current store contents.
    ///
    /// With `bulk_initial` set, an empty store is always loaded in bulk.
    pub fn classify<T>(
        store: &EntryStore<K, T>,
        order: &[K],
        bulk_initial: bool,
    ) -> Result<Self, ReloadReason> {
        if store.is_empty() && !order.is_empty() && bulk_initial {
            return Err(ReloadReason::InitialLoad);
        }

        let mut seen: HashSet<&K> = HashSet::with_capacity(order.len());
        let mut kept = Vec::with_capacity(order.len().min(store.len()));
        let mut to_fetch = Vec::new();
        let mut insert_at = 0;
        let mut run_end: Option<usize> = None;

        for (position, id) in order.iter().enumerate() {
            if !seen.insert(id) {
                return Err(ReloadReason::DuplicateInOrder);
            }
            if store.contains(id) {
                kept.push(id.clone());
                continue;
            }
            match run_end {
                None => insert_at = position,
                Some(last) if last + 1 == position => {}
                Some(_) => return Err(ReloadReason::SplitInsertion),
            }
            run_end = Some(position);
            to_fetch.push(id.clone());
        }

        let mut removals = Vec::new();
        let mut survivors = Vec::with_capacity(kept.len());
        for (index, id) in store.ids().enumerate() {
            if seen.contains(id) {
                survivors.push(id);
            } else {
                removals.push(index);
            }
        }
        removals.reverse();

        if !to_fetch.is_empty() && !survivors.iter().copied().eq(kept.iter()) {
            return Err(ReloadReason::ReorderWithInsertion);
        }

        Ok(Self {
            removals,
            kept,
            insert_at,
            to_fetch,
        })
    }

    /// Returns true if the plan only adds new ids.
    pub fn is_insert_only(&self) -> bool {
        self.removals.is_empty() && !self.to_fetch.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_of(ids: &[&'static str]) -> EntryStore<&'static str, ()> {
        ids.iter().map(|id| (*id, ())).collect()
    }

    #[test]
    fn test_classify_remove_and_append_run() {
        let store = store_of(&["a", "b", "c"]);

        let plan = ReconcilePlan::classify(&store, &["a", "c", "d", "e"], true).unwrap();
        assert_eq!(plan.removals, vec![1]);
        assert_eq!(plan.kept, vec!["a", "c"]);
        assert_eq!(plan.insert_at, 2);
        assert_eq!(plan.to_fetch, vec!["d", "e"]);
    }

    #[test]
    fn test_classify_removals_are_descending() {
        let store = store_of(&["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);

        let plan = ReconcilePlan::classify(
            &store,
            &["0", "1", "3", "4", "6", "8", "9"],
            true,
        )
        .unwrap();
        assert_eq!(plan.removals, vec![7, 5, 2]);
        assert!(plan.to_fetch.is_empty());
    }

    #[test]
    fn test_classify_run_at_front() {
        let store = store_of(&["a", "b"]);

        let plan = ReconcilePlan::classify(&store, &["x", "y", "a", "b"], true).unwrap();
        assert_eq!(plan.insert_at, 0);
        assert_eq!(plan.to_fetch, vec!["x", "y"]);
        assert!(plan.is_insert_only());
    }

    #[test]
    fn test_classify_pure_reorder_is_incremental() {
        let store = store_of(&["a", "b", "c"]);

        let plan = ReconcilePlan::classify(&store, &["c", "a", "b"], true).unwrap();
        assert_eq!(plan.kept, vec!["c", "a", "b"]);
        assert!(plan.removals.is_empty());
        assert!(plan.to_fetch.is_empty());
    }

    #[test]
    fn test_classify_split_insertion_reloads() {
        let store = store_of(&["a", "b"]);

        let result = ReconcilePlan::classify(&store, &["x", "a", "y", "b"], true);
        assert_eq!(result.unwrap_err(), ReloadReason::SplitInsertion);
    }

    #[test]
    fn test_classify_reorder_with_insertion_reloads() {
        let store = store_of(&["a", "b", "c"]);

        let result = ReconcilePlan::classify(&store, &["c", "x", "a"], true);
        assert_eq!(result.unwrap_err(), ReloadReason::ReorderWithInsertion);
    }

    #[test]
    fn test_classify_duplicate_in_order_reloads() {
        let store = store_of(&["a"]);

        let result = ReconcilePlan::classify(&store, &["a", "b", "a"], true);
        assert_eq!(result.unwrap_err(), ReloadReason::DuplicateInOrder);
    }

    #[test]
    fn test_classify_empty_store() {
        let store = store_of(&[]);

        let result = ReconcilePlan::classify(&store, &["a", "b"], true);
        assert_eq!(result.unwrap_err(), ReloadReason::InitialLoad);

        let plan = ReconcilePlan::classify(&store, &["a", "b"], false).unwrap();
        assert_eq!(plan.insert_at, 0);
        assert_eq!(plan.to_fetch, vec!["a", "b"]);
    }
}
