//! Collaborator seams: item fetching and reorder publishing.

use crate::error::{FetchError, PublishError};
use crate::store::ItemId;
use async_trait::async_trait;
use tracing::debug;

/// Source of item payloads.
///
/// The reconciler issues at most one outstanding `fetch` per reconcile
/// call, in target order. Completions are awaited on the reconcile task, so
/// an implementation may do network I/O freely without touching the store.
#[async_trait]
pub trait ItemFetcher<K, T>: Send + Sync
where
    K: ItemId,
    T: Send + 'static,
{
    /// Fetches the payload for a single id.
    async fn fetch(&self, id: &K) -> Result<T, FetchError>;

    /// Fetches payloads for a whole order, used by full reload.
    ///
    /// The result is positional: `result[i]` belongs to `order[i]`, `None`
    /// marks an id the source could not provide. An `Err` means the bulk
    /// request as a whole failed.
    ///
    /// The default implementation calls [`fetch`](Self::fetch) sequentially.
    async fn fetch_all(&self, order: &[K]) -> Result<Vec<Option<T>>, FetchError> {
        let mut payloads = Vec::with_capacity(order.len());
        for id in order {
            match self.fetch(id).await {
                Ok(payload) => payloads.push(Some(payload)),
                Err(e) => {
                    debug!(id = ?id, error = %e, "bulk fetch: item unavailable");
                    payloads.push(None);
                }
            }
        }
        Ok(payloads)
    }
}

/// Sink for locally reordered collections (drag and drop).
///
/// The remote side stays authoritative: a rejected order makes the service
/// reload the previous canonical order.
#[async_trait]
pub trait ReorderPublisher<K>: Send + Sync
where
    K: ItemId,
{
    /// Publishes the new local order to the remote side.
    async fn publish(&self, order: &[K]) -> Result<(), PublishError>;
}
