//! Drives a scenario through the reconcile service
//!
//! Steps are sent without waiting for the service, so pushes that are not
//! separated by a `wait_ms` step land in the pending queue while an earlier
//! reconcile is still fetching.

use crate::config_file::ReplayConfig;
use crate::error::{ReplayError, Result};
use crate::scenario::{Scenario, ScenarioItem, Step};
use crate::sink::JsonLinesSink;
use async_trait::async_trait;
use ordsync_common::{
    FetchError, ItemFetcher, MemoryFetcher, PublishError, ReconcileService, Reconciler,
    ReorderPublisher,
};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

/// Item source built from a scenario catalogue, with per-item latency
pub struct ScenarioFetcher {
    inner: MemoryFetcher<String, String>,
    delays: HashMap<String, Duration>,
}

impl ScenarioFetcher {
    /// Builds the catalogue; items marked `fail` are known but unfetchable
    pub fn from_items(items: &[ScenarioItem]) -> Self {
        let inner = MemoryFetcher::new();
        let mut delays = HashMap::new();
        for item in items {
            inner.insert(item.id.clone(), item.title().to_string());
            if item.fail {
                inner.fail(item.id.clone());
            }
            if item.delay_ms > 0 {
                delays.insert(item.id.clone(), Duration::from_millis(item.delay_ms));
            }
        }
        Self { inner, delays }
    }
}

#[async_trait]
impl ItemFetcher<String, String> for ScenarioFetcher {
    async fn fetch(&self, id: &String) -> std::result::Result<String, FetchError> {
        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.fetch(id).await
    }

    async fn fetch_all(
        &self,
        order: &[String],
    ) -> std::result::Result<Vec<Option<String>>, FetchError> {
        self.inner.fetch_all(order).await
    }
}

/// Remote side of local reorders; accepts or rejects all of them
pub struct ScenarioPublisher {
    reject: bool,
}

#[async_trait]
impl ReorderPublisher<String> for ScenarioPublisher {
    async fn publish(&self, order: &[String]) -> std::result::Result<(), PublishError> {
        if self.reject {
            return Err(PublishError::rejected("scenario rejects reorders"));
        }
        debug!(len = order.len(), "reorder accepted");
        Ok(())
    }
}

/// Replays `scenario`, writing events to `out`
///
/// Returns the sink once every step has been handled and the closing
/// `final` line has been written. Fails with [`ReplayError::Output`] if any
/// change event could not be written.
pub async fn replay<W>(
    scenario: &Scenario,
    config: &ReplayConfig,
    out: W,
) -> Result<JsonLinesSink<W>>
where
    W: Write + Send + 'static,
{
    config.validate()?;

    let fetcher = ScenarioFetcher::from_items(&scenario.items);
    let sink = JsonLinesSink::new(out).with_pretty(config.output.pretty);
    let reconciler = Reconciler::with_config(config.reconciler.clone(), fetcher, sink);
    let (service, handle) = ReconcileService::new(reconciler);
    let join = service
        .with_publisher(ScenarioPublisher {
            reject: scenario.reject_reorders,
        })
        .spawn();

    info!(
        items = scenario.items.len(),
        steps = scenario.steps.len(),
        orders = scenario.order_count(),
        "replaying scenario"
    );

    for (n, step) in scenario.steps.iter().enumerate() {
        debug!(step = n, ?step, "sending step");
        match step.clone() {
            Step::Order(order) => handle.submit(order)?,
            Step::Remove(id) => handle.remove(id)?,
            Step::Insert { index, id, title } => handle.insert(index, id, title)?,
            Step::Move { from, to } => handle.move_item(from, to)?,
            Step::Reload(true) => handle.reload()?,
            Step::Reload(false) => {}
            Step::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        }
    }

    // dropping the last handle lets the service drain its queue and stop
    drop(handle);
    let reconciler = join.await?;

    let final_order = reconciler.store().order();
    let (_, mut sink) = reconciler.into_parts();
    if sink.write_errors() > 0 {
        return Err(ReplayError::Output(sink.write_errors()));
    }
    sink.write_final(&final_order)?;
    info!(
        events = sink.events(),
        len = final_order.len(),
        "scenario finished"
    );
    Ok(sink)
}
