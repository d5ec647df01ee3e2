//! Chunked dispatch with a completion barrier between chunks.

use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::{Aggregate, ResultAggregator};
use crate::guard::TimeoutGuard;
use crate::model::ProbeOutcome;
use crate::registry::ProbeRegistry;

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Runs requested checks in consecutive chunks of at most `concurrency` members.
/// Chunk k+1 does not start until every member of chunk k has resolved.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    registry: Arc<ProbeRegistry>,
    guard: TimeoutGuard,
    concurrency: usize,
}

impl BatchScheduler {
    pub fn new(registry: Arc<ProbeRegistry>, guard: TimeoutGuard, concurrency: usize) -> Self {
        BatchScheduler { registry, guard, concurrency: concurrency.max(1) }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Sizes of the chunks `ids` will be dispatched in.
    pub fn plan(&self, ids: &[String]) -> Vec<usize> {
        ids.chunks(self.concurrency).map(<[String]>::len).collect()
    }

    pub async fn run(&self, url: &str, ids: &[String]) -> Aggregate {
        let mut aggregator = ResultAggregator::with_capacity(ids.len());
        let chunks = ids.len().div_ceil(self.concurrency);
        for (n, chunk) in ids.chunks(self.concurrency).enumerate() {
            debug!(chunk = n + 1, of = chunks, size = chunk.len(), "dispatching chunk");
            // join_all keeps input order, so each outcome lands in its request slot.
            let outcomes = join_all(chunk.iter().map(|requested| self.dispatch(url, requested))).await;
            for (requested, outcome) in chunk.iter().zip(outcomes) {
                aggregator.record(requested, outcome);
            }
        }
        aggregator.finish()
    }

    async fn dispatch(&self, url: &str, requested: &str) -> ProbeOutcome {
        match self.registry.lookup(requested) {
            Some((id, probe)) => self.guard.guard(id, probe, url).await,
            None => {
                debug!(check = requested, "no probe registered");
                ProbeOutcome::Unsupported
            }
        }
    }
}
