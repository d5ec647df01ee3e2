use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::AuditRecord;

/// Best-effort audit store for completed scans.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn store(&self, record: &AuditRecord) -> Result<()>;
}

/// Discards records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl PersistenceSink for NullSink {
    async fn store(&self, record: &AuditRecord) -> Result<()> {
        debug!(url = %record.url, "audit persistence disabled");
        Ok(())
    }
}

/// Fire-and-forget write. Errors are logged and dropped; the caller never waits.
pub fn persist_in_background(sink: Arc<dyn PersistenceSink>, record: AuditRecord) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = sink.store(&record).await {
            warn!(url = %record.url, error = %e, "failed to save scan results");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::BTreeMap;

    struct Broken;

    #[async_trait]
    impl PersistenceSink for Broken {
        async fn store(&self, _record: &AuditRecord) -> Result<()> {
            Err(anyhow!("database unavailable"))
        }
    }

    #[tokio::test]
    async fn background_failure_is_swallowed() {
        let record = AuditRecord { url: "http://t".into(), vulnerabilities: vec!["xss".into()], results: BTreeMap::new() };
        let handle = persist_in_background(Arc::new(Broken), record.clone());
        assert!(handle.await.is_ok());
        assert!(persist_in_background(Arc::new(NullSink), record).await.is_ok());
    }
}
