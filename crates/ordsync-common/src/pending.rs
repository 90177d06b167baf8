//! Pending request queue for canonical orders.
//!
//! At most one order is active at a time. Orders submitted while one is
//! active wait here until [`PendingQueue::complete`] releases them.
//!
//! # Queue Policies
//!
//! - `Coalesce`: a newly queued order replaces every queued one. Only the
//!   last pushed order matters for convergence, and replaying intermediate
//!   orders could remove and reinsert the same id (visible flicker).
//! - `Fifo`: orders are replayed one by one. Consecutive identical orders
//!   are merged; when the queue is full the oldest one is dropped and
//!   counted, with a warning.

use crate::config::{QueueConfig, QueuePolicy};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// An order waiting to be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest<K> {
    /// The desired end order
    pub order: Vec<K>,
    /// When the order was submitted
    pub enqueued_at: DateTime<Utc>,
}

impl<K> PendingRequest<K> {
    /// Creates a request stamped with the current time.
    pub fn new(order: Vec<K>) -> Self {
        Self {
            order,
            enqueued_at: Utc::now(),
        }
    }
}

/// Serializes reconcile requests.
#[derive(Debug)]
pub struct PendingQueue<K> {
    config: QueueConfig,
    reconciling: bool,
    queue: VecDeque<PendingRequest<K>>,
    /// Orders superseded by a newer one (coalesce) or merged into an identical one
    superseded: u64,
    /// Orders dropped because a fifo queue was full
    dropped: u64,
}

impl<K> PendingQueue<K>
where
    K: PartialEq + std::fmt::Debug,
{
    /// Creates an idle queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            reconciling: false,
            queue: VecDeque::new(),
            superseded: 0,
            dropped: 0,
        }
    }

    /// Returns the queue policy.
    pub fn policy(&self) -> QueuePolicy {
        self.config.policy
    }

    /// Returns true while an order is active.
    pub fn is_reconciling(&self) -> bool {
        self.reconciling
    }

    /// Returns the number of queued (not active) orders.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no order is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued orders replaced by a newer or identical one.
    pub fn superseded_count(&self) -> u64 {
        self.superseded
    }

    /// Number of queued orders dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Submits an order.
    ///
    /// Returns the request to run now if the queue was idle; otherwise the
    /// order is queued and `None` is returned.
    pub fn submit(&mut self, order: Vec<K>) -> Option<PendingRequest<K>> {
        let request = PendingRequest::new(order);
        if !self.reconciling {
            self.reconciling = true;
            return Some(request);
        }
        self.enqueue(request);
        None
    }

    fn enqueue(&mut self, request: PendingRequest<K>) {
        match self.config.policy {
            QueuePolicy::Coalesce => {
                if !self.queue.is_empty() {
                    self.superseded += self.queue.len() as u64;
                    debug!(superseded = self.queue.len(), "coalescing queued orders");
                    self.queue.clear();
                }
                self.queue.push_back(request);
            }
            QueuePolicy::Fifo => {
                if let Some(last) = self.queue.back_mut() {
                    if last.order == request.order {
                        // Same intent: keep one, but remember the newer timestamp
                        last.enqueued_at = request.enqueued_at;
                        self.superseded += 1;
                        return;
                    }
                }
                if self.queue.len() >= self.config.capacity {
                    if let Some(oldest) = self.queue.pop_front() {
                        self.dropped += 1;
                        warn!(
                            capacity = self.config.capacity,
                            enqueued_at = %oldest.enqueued_at,
                            "pending queue full, dropping oldest queued order"
                        );
                    }
                }
                self.queue.push_back(request);
            }
        }
    }

    /// Marks the active order as finished.
    ///
    /// Returns the next order to run, or `None` (and goes idle) if nothing
    /// is queued.
    pub fn complete(&mut self) -> Option<PendingRequest<K>> {
        match self.queue.pop_front() {
            Some(next) => {
                self.reconciling = true;
                Some(next)
            }
            None => {
                self.reconciling = false;
                None
            }
        }
    }

    /// Peeks at queued orders without removing them.
    pub fn peek(&self) -> impl Iterator<Item = &PendingRequest<K>> {
        self.queue.iter()
    }

    /// Drops every queued order and goes idle.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.reconciling = false;
    }

    /// Dumps queued orders for debugging.
    pub fn dump(&self) -> Vec<String> {
        self.queue
            .iter()
            .map(|r| format!("{}: {:?}", r.enqueued_at.to_rfc3339(), r.order))
            .collect()
    }
}
