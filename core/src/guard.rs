//! Per-probe deadline enforcement.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::catalog::VulnerabilityId;
use crate::model::{ProbeOutcome, UNKNOWN_ERROR};
use crate::registry::Probe;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Races one probe invocation against a fixed deadline. Every failure mode of the
/// probe (error, panic, stall) comes back as a `ProbeOutcome`.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    deadline: Duration,
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        TimeoutGuard::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl TimeoutGuard {
    pub fn new(deadline: Duration) -> Self {
        TimeoutGuard { deadline }
    }

    pub async fn guard(&self, id: VulnerabilityId, probe: Arc<dyn Probe>, url: &str) -> ProbeOutcome {
        let target = url.to_string();
        // Spawned so a panicking probe is contained in its own task.
        let mut handle = tokio::spawn(async move { probe.invoke(&target).await });
        match timeout(self.deadline, &mut handle).await {
            Ok(Ok(Ok(finding))) => ProbeOutcome::from_finding(finding),
            Ok(Ok(Err(e))) => {
                let msg = e.to_string();
                warn!(check = %id, error = %msg, "probe failed");
                ProbeOutcome::ExecutionError(if msg.is_empty() { UNKNOWN_ERROR.to_string() } else { msg })
            }
            Ok(Err(join)) => {
                warn!(check = %id, error = %join, "probe task aborted");
                let msg = if join.is_panic() { "probe panicked" } else { "probe cancelled" };
                ProbeOutcome::ExecutionError(msg.to_string())
            }
            Err(_) => {
                handle.abort();
                warn!(check = %id, deadline_ms = self.deadline.as_millis() as u64, "probe timed out");
                ProbeOutcome::TimedOut { after: self.deadline }
            }
        }
    }
}
