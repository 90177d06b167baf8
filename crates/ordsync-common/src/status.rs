//! Reconcile outcome types.

use serde::Serialize;
use std::fmt;

/// Why a reconcile call fell back to a full reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadReason {
    /// The store was empty; it is populated in one batch
    InitialLoad,
    /// New ids appear at more than one point of the order
    SplitInsertion,
    /// New ids arrive together with a reordering of kept ids
    ReorderWithInsertion,
    /// The canonical order lists the same id twice
    DuplicateInOrder,
    /// A fetched id was already present when it was inserted
    DuplicateOnInsert,
    /// A kept id disappeared from the store mid-reconcile
    Vanished,
    /// A caller asked for a reload explicitly
    Requested,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReloadReason::InitialLoad => "initial load",
            ReloadReason::SplitInsertion => "split insertion",
            ReloadReason::ReorderWithInsertion => "reorder with insertion",
            ReloadReason::DuplicateInOrder => "duplicate id in order",
            ReloadReason::DuplicateOnInsert => "duplicate id on insert",
            ReloadReason::Vanished => "kept id vanished",
            ReloadReason::Requested => "requested",
        };
        f.write_str(s)
    }
}

/// Result of a single reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// The store already matched the order; nothing was emitted
    Unchanged,
    /// Removals, moves and insertions were applied incrementally
    Applied,
    /// The store was replaced wholesale
    Reloaded,
    /// A full reload was needed but the bulk fetch failed
    ReloadFailed,
}

impl ReconcileStatus {
    /// Returns true if the store reached the requested order (minus failed fetches).
    pub fn is_success(&self) -> bool {
        !matches!(self, ReconcileStatus::ReloadFailed)
    }

    /// Returns true if the call went through the full reload path.
    pub fn is_reload(&self) -> bool {
        matches!(self, ReconcileStatus::Reloaded | ReconcileStatus::ReloadFailed)
    }
}

/// Summary of what a reconcile call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Final status
    pub status: ReconcileStatus,
    /// Why a reload happened, if it did
    pub reload_reason: Option<ReloadReason>,
    /// Number of entries removed
    pub removed: usize,
    /// Number of entries moved
    pub moved: usize,
    /// Number of entries inserted (or loaded, for a reload)
    pub inserted: usize,
    /// Ids whose fetch failed, rendered with `Debug`
    pub failed: Vec<String>,
}

impl ReconcileReport {
    /// Creates an empty report with the given status.
    pub fn new(status: ReconcileStatus) -> Self {
        Self {
            status,
            reload_reason: None,
            removed: 0,
            moved: 0,
            inserted: 0,
            failed: Vec::new(),
        }
    }

    /// Report for an order that already matched the store.
    pub fn unchanged() -> Self {
        Self::new(ReconcileStatus::Unchanged)
    }

    /// Sets the reload reason.
    pub fn with_reason(mut self, reason: ReloadReason) -> Self {
        self.reload_reason = Some(reason);
        self
    }

    /// Total number of structural changes emitted.
    pub fn change_count(&self) -> usize {
        self.removed + self.moved + self.inserted
    }
}
