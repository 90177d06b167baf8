//! Verification helpers for testing reconcilers
//!
//! Provides assertion helpers to verify store contents and change streams

use crate::fixtures::MirrorSink;
use ordsync_common::{EntryStore, ItemId};
use std::collections::HashSet;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Order mismatch: expected {expected}, got {actual}")]
    OrderMismatch { expected: String, actual: String },

    #[error("Id '{id}' appears more than once")]
    DuplicateId { id: String },

    #[error("Side index disagrees with entry order")]
    InconsistentIndex,

    #[error("Change stream diverged from store: {details}")]
    MirrorDiverged { details: String },

    #[error("Id '{id}' was absent from snapshot {snapshot}")]
    Flicker { id: String, snapshot: usize },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Entry store verification helper
pub struct StoreVerifier<'a, K, T>
where
    K: ItemId,
{
    store: &'a EntryStore<K, T>,
}

impl<'a, K, T> StoreVerifier<'a, K, T>
where
    K: ItemId,
{
    /// Create a new store verifier
    pub fn new(store: &'a EntryStore<K, T>) -> Self {
        Self { store }
    }

    /// Verify that the store holds exactly `expected`, in order
    pub fn assert_order(&self, expected: &[K]) -> VerifyResult<()> {
        let actual = self.store.order();
        if actual != expected {
            return Err(VerificationError::OrderMismatch {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            });
        }
        Ok(())
    }

    /// Verify that the store holds `requested` minus the `failed` ids, in order
    pub fn assert_order_without(&self, requested: &[K], failed: &[K]) -> VerifyResult<()> {
        let expected: Vec<K> = requested
            .iter()
            .filter(|id| !failed.contains(id))
            .cloned()
            .collect();
        self.assert_order(&expected)
    }

    /// Verify that no id appears twice
    pub fn assert_no_duplicates(&self) -> VerifyResult<()> {
        let mut seen = HashSet::new();
        for id in self.store.ids() {
            if !seen.insert(id) {
                return Err(VerificationError::DuplicateId {
                    id: format!("{:?}", id),
                });
            }
        }
        Ok(())
    }

    /// Verify that the side index matches the entry positions
    pub fn assert_consistent(&self) -> VerifyResult<()> {
        if !self.store.is_consistent() {
            return Err(VerificationError::InconsistentIndex);
        }
        Ok(())
    }

    /// Verify that replaying the emitted changes lands on the store contents
    pub fn assert_mirrored(&self, sink: &MirrorSink<K>) -> VerifyResult<()> {
        if let Some(first) = sink.violations().first() {
            return Err(VerificationError::MirrorDiverged {
                details: first.clone(),
            });
        }
        let actual = self.store.order();
        if sink.mirror() != actual.as_slice() {
            return Err(VerificationError::MirrorDiverged {
                details: format!("mirror {:?}, store {:?}", sink.mirror(), actual),
            });
        }
        Ok(())
    }

    /// Run every structural check
    pub fn assert_all(&self, sink: &MirrorSink<K>) -> VerifyResult<()> {
        self.assert_no_duplicates()?;
        self.assert_consistent()?;
        self.assert_mirrored(sink)
    }
}

/// Verify that `id` is present in every snapshot
pub fn assert_never_absent<K>(snapshots: &[Vec<K>], id: &K) -> VerifyResult<()>
where
    K: ItemId,
{
    match snapshots.iter().position(|snapshot| !snapshot.contains(id)) {
        Some(snapshot) => Err(VerificationError::Flicker {
            id: format!("{:?}", id),
            snapshot,
        }),
        None => Ok(()),
    }
}
