//! Error types for reconciliation.
//!
//! Store errors are structural and never escape [`Reconciler::reconcile`];
//! the reconciler turns them into a full reload. Fetch errors are recoverable
//! and surfaced to the change sink as events.
//!
//! [`Reconciler::reconcile`]: crate::Reconciler::reconcile

use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`EntryStore`](crate::EntryStore) mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The id is already present in the store.
    #[error("Duplicate id {id} already present in store")]
    DuplicateId {
        /// Debug rendering of the offending id.
        id: String,
    },

    /// The index does not address a live entry (or insertion slot).
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Store length at the time of the call.
        len: usize,
    },
}

impl StoreError {
    /// Creates a duplicate id error from any debuggable id.
    pub fn duplicate_id(id: &impl std::fmt::Debug) -> Self {
        Self::DuplicateId {
            id: format!("{:?}", id),
        }
    }

    /// Creates an index out of range error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }
}

/// Errors returned by an [`ItemFetcher`](crate::ItemFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The remote side has no item with this id.
    #[error("Item {id} not found")]
    NotFound {
        /// Debug rendering of the id.
        id: String,
    },

    /// The remote side could not be reached or refused the request.
    #[error("Fetch unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// The fetch did not complete in time.
    #[error("Fetch timed out after {after:?}")]
    Timeout {
        /// The configured timeout.
        after: Duration,
    },

    /// A bulk reload returned no payload for this id.
    #[error("Bulk reload returned no payload for {id}")]
    Missing {
        /// Debug rendering of the id.
        id: String,
    },
}

impl FetchError {
    /// Creates a not found error.
    pub fn not_found(id: &impl std::fmt::Debug) -> Self {
        Self::NotFound {
            id: format!("{:?}", id),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a missing-from-bulk error.
    pub fn missing(id: &impl std::fmt::Debug) -> Self {
        Self::Missing {
            id: format!("{:?}", id),
        }
    }

    /// Returns true if the same fetch may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Unavailable { .. } | FetchError::Timeout { .. })
    }
}

/// Errors returned by a [`ReorderPublisher`](crate::ReorderPublisher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The remote side refused the new order.
    #[error("Reorder rejected: {message}")]
    Rejected {
        /// Error message.
        message: String,
    },
}

impl PublishError {
    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Errors returned by a [`ServiceHandle`](crate::ServiceHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The reconcile service is no longer running.
    #[error("Reconcile service closed")]
    Closed,
}

/// Errors raised while validating a [`ReconcilerConfig`](crate::ReconcilerConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
