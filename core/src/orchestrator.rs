//! Validate -> dispatch -> aggregate -> classify -> persist -> compose.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::classify::classify;
use crate::error::ScanError;
use crate::guard::{TimeoutGuard, DEFAULT_PROBE_TIMEOUT};
use crate::model::{AuditRecord, ScanRequest};
use crate::persist::{persist_in_background, NullSink, PersistenceSink};
use crate::registry::ProbeRegistry;
use crate::report::{compose, now_rfc3339, ScanReport};
use crate::scheduler::{BatchScheduler, DEFAULT_CONCURRENCY};
use crate::severity::SeverityTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Chunk size for concurrent dispatch.
    pub concurrency: usize,
    pub probe_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings { concurrency: DEFAULT_CONCURRENCY, probe_timeout: DEFAULT_PROBE_TIMEOUT }
    }
}

/// Runs scan requests end to end. Registry and severity table are injected and
/// shared read-only across concurrent scans.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ProbeRegistry>,
    severity: Arc<SeverityTable>,
    scheduler: BatchScheduler,
    sink: Arc<dyn PersistenceSink>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ProbeRegistry>, severity: Arc<SeverityTable>, settings: EngineSettings) -> Self {
        let scheduler = BatchScheduler::new(registry.clone(), TimeoutGuard::new(settings.probe_timeout), settings.concurrency);
        Orchestrator { registry, severity, scheduler, sink: Arc::new(NullSink) }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub fn severity_table(&self) -> &SeverityTable {
        &self.severity
    }

    pub async fn scan(&self, request: &ScanRequest) -> ScanReport {
        self.scan_tracked(request).await.0
    }

    /// Like [`Orchestrator::scan`], also handing back the background audit write so
    /// short-lived callers can wait for it. The report never depends on that write.
    pub async fn scan_tracked(&self, request: &ScanRequest) -> (ScanReport, JoinHandle<()>) {
        let started = Instant::now();
        info!(url = request.url(), checks = request.len(), "scan started");

        let aggregate = self.scheduler.run(request.url(), request.vulnerability_ids()).await;
        let classification = classify(&aggregate, &self.severity);

        let persisted = persist_in_background(
            self.sink.clone(),
            AuditRecord {
                url: request.url().to_string(),
                vulnerabilities: request.vulnerability_ids().to_vec(),
                results: aggregate.results(),
            },
        );

        let report = compose(request.url(), request.len(), &aggregate, classification, now_rfc3339());
        info!(
            url = request.url(),
            found = report.scan_summary.vulnerabilities_found,
            failed = report.scan_summary.failed,
            unsupported = report.scan_summary.unsupported,
            duration_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );
        (report, persisted)
    }

    /// Run a scan on its own task so an unexpected failure inside the pipeline
    /// surfaces as `ScanError::Internal` instead of taking the caller down.
    pub async fn scan_isolated(&self, request: ScanRequest) -> Result<ScanReport, ScanError> {
        let this = self.clone();
        tokio::spawn(async move { this.scan(&request).await }).await.map_err(|e| {
            error!(error = %e, "scan task failed");
            ScanError::Internal(e.to_string())
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("concurrency", &self.scheduler.concurrency())
            .finish()
    }
}
