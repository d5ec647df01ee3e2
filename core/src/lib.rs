//! Scan orchestration engine: bounded, chunked probe dispatch with per-probe
//! deadlines, failure isolation and severity-ordered reporting.

pub mod aggregate;
pub mod catalog;
pub mod classify;
pub mod error;
pub mod guard;
pub mod model;
pub mod orchestrator;
pub mod persist;
pub mod ratelimiter;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod severity;

pub use aggregate::{Aggregate, FailedCheck, ResultAggregator};
pub use catalog::{ScanProfile, VulnerabilityId};
pub use classify::{classify, Classification, Recommendation};
pub use error::{ScanError, ValidationError};
pub use guard::TimeoutGuard;
pub use model::{AuditRecord, ProbeFinding, ProbeOutcome, ResultEntry, ScanRequest};
pub use orchestrator::{EngineSettings, Orchestrator};
pub use persist::{NullSink, PersistenceSink};
pub use registry::{Probe, ProbeRegistry};
pub use report::{ScanErrorEntry, ScanReport, ScanSummary, Warnings};
pub use scheduler::BatchScheduler;
pub use severity::{Severity, SeverityTable};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
