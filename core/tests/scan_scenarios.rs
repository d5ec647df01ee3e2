use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use vulnscan_core::{
    AuditRecord, EngineSettings, Orchestrator, PersistenceSink, Probe, ProbeFinding, ProbeRegistry, ScanReport,
    ScanRequest, Severity, SeverityTable, VulnerabilityId,
};

struct Fixed {
    finding: Option<ProbeFinding>,
    error: Option<&'static str>,
    delay: Duration,
}

#[async_trait]
impl Probe for Fixed {
    async fn invoke(&self, _url: &str) -> Result<ProbeFinding> {
        tokio::time::sleep(self.delay).await;
        if let Some(e) = self.error {
            return Err(anyhow!(e));
        }
        Ok(self.finding.clone().unwrap_or_default())
    }
}

fn vulnerable(delay_ms: u64) -> Fixed {
    Fixed { finding: Some(ProbeFinding::vulnerable()), error: None, delay: Duration::from_millis(delay_ms) }
}

fn clean() -> Fixed {
    Fixed { finding: Some(ProbeFinding::clean()), error: None, delay: Duration::ZERO }
}

fn failing(msg: &'static str) -> Fixed {
    Fixed { finding: None, error: Some(msg), delay: Duration::ZERO }
}

fn orchestrator(reg: ProbeRegistry, settings: EngineSettings) -> Orchestrator {
    Orchestrator::new(Arc::new(reg), Arc::new(SeverityTable::standard()), settings)
}

fn request(ids: &[&str]) -> ScanRequest {
    ScanRequest::new("http://example.com", ids.iter().map(|s| s.to_string()).collect()).unwrap()
}

fn assert_summary_laws(report: &ScanReport, requested: usize) {
    let s = report.scan_summary;
    assert_eq!(s.total, requested);
    assert_eq!(s.completed + s.unsupported, requested);
    assert!(s.failed <= s.completed);
    assert_eq!(s.vulnerabilities_found, report.detected_vulnerabilities.len());
    let scan_errors = report.warnings.as_ref().map(|w| w.scan_errors.len()).unwrap_or(0);
    assert_eq!(scan_errors, s.failed);
}

#[tokio::test]
async fn scenario_a_two_high_findings_keep_request_order() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::SqlInjection, vulnerable(0));
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    let report = orchestrator(reg, EngineSettings::default()).scan(&request(&["sql_injection", "xss"])).await;

    assert_eq!(report.detected_vulnerabilities, vec!["sql_injection", "xss"]);
    let v = serde_json::to_value(&report).unwrap();
    assert_eq!(
        v["scanSummary"],
        json!({ "total": 2, "completed": 2, "vulnerabilitiesFound": 2, "failed": 0, "unsupported": 0 })
    );
    assert!(v.get("warnings").is_none());
    assert_eq!(report.recommendations["xss"].severity, Severity::High);
    assert_summary_laws(&report, 2);
}

#[tokio::test]
async fn scenario_b_unknown_check_is_unsupported() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    let report = orchestrator(reg, EngineSettings::default()).scan(&request(&["xss", "unknown_check"])).await;

    assert_eq!(report.scan_summary.unsupported, 1);
    let warnings = report.warnings.as_ref().unwrap();
    assert_eq!(warnings.unsupported_vulnerabilities, vec!["unknown_check"]);
    assert!(warnings.scan_errors.is_empty());
    assert!(!report.detected_vulnerabilities.contains(&"unknown_check".to_string()));
    assert!(!report.recommendations.contains_key("unknown_check"));
    assert_summary_laws(&report, 2);
}

struct Recording(mpsc::UnboundedSender<AuditRecord>);

#[async_trait]
impl PersistenceSink for Recording {
    async fn store(&self, record: &AuditRecord) -> Result<()> {
        self.0.send(record.clone()).map_err(|e| anyhow!(e.to_string()))
    }
}

#[tokio::test]
async fn scenario_c_probe_error_is_reported_and_persisted() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Csrf, failing("network down"));
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = orchestrator(reg, EngineSettings::default()).with_sink(Arc::new(Recording(tx)));

    let report = orch.scan(&request(&["csrf", "xss"])).await;
    assert_eq!(report.scan_summary.failed, 1);
    let v = serde_json::to_value(&report).unwrap();
    assert_eq!(v["warnings"]["scanErrors"], json!([{ "vulnerability": "csrf", "error": "network down" }]));
    assert_summary_laws(&report, 2);

    let record = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.vulnerabilities, vec!["csrf", "xss"]);
    let csrf = serde_json::to_value(&record.results["csrf"]).unwrap();
    assert_eq!(csrf["vulnerable"], json!(false));
    assert_eq!(csrf["error"], json!(true));
    assert!(record.results["xss"].vulnerable);
}

#[derive(Default)]
struct Trace {
    seq: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    spans: Mutex<Vec<(usize, usize, usize)>>,
}

struct Instrumented {
    slot: usize,
    trace: Arc<Trace>,
}

#[async_trait]
impl Probe for Instrumented {
    async fn invoke(&self, _url: &str) -> Result<ProbeFinding> {
        let start = self.trace.seq.fetch_add(1, Ordering::SeqCst);
        let now = self.trace.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.trace.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5 + (self.slot as u64 % 4) * 10)).await;
        self.trace.in_flight.fetch_sub(1, Ordering::SeqCst);
        let end = self.trace.seq.fetch_add(1, Ordering::SeqCst);
        self.trace.spans.lock().unwrap().push((self.slot, start, end));
        Ok(ProbeFinding::clean())
    }
}

#[tokio::test]
async fn scenario_f_chunks_are_separated_by_a_barrier() {
    let trace = Arc::new(Trace::default());
    let mut reg = ProbeRegistry::new();
    let ids: Vec<VulnerabilityId> = VulnerabilityId::ALL[..12].to_vec();
    for (slot, id) in ids.iter().enumerate() {
        reg.register(*id, Instrumented { slot, trace: trace.clone() });
    }
    let settings = EngineSettings { concurrency: 5, probe_timeout: Duration::from_secs(5) };
    let orch = orchestrator(reg, settings);
    let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();

    let report = orch.scan(&request(&names)).await;
    assert_eq!(report.scan_summary.completed, 12);
    assert!(trace.peak.load(Ordering::SeqCst) <= 5);

    let spans = trace.spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 12);
    let chunk_of = |slot: usize| slot / 5;
    let sizes: Vec<usize> = (0..3).map(|c| spans.iter().filter(|s| chunk_of(s.0) == c).count()).collect();
    assert_eq!(sizes, vec![5, 5, 2]);
    for c in 0..2 {
        let last_end = spans.iter().filter(|s| chunk_of(s.0) == c).map(|s| s.2).max().unwrap();
        let next_start = spans.iter().filter(|s| chunk_of(s.0) == c + 1).map(|s| s.1).min().unwrap();
        assert!(last_end < next_start, "chunk {} overlapped chunk {}", c + 1, c + 2);
    }
}

#[tokio::test]
async fn severity_order_ignores_completion_timing() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::InsufficientLogging, vulnerable(0));
    reg.register(VulnerabilityId::Csrf, vulnerable(5));
    reg.register(VulnerabilityId::SqlInjection, vulnerable(40));
    reg.register(VulnerabilityId::Ssrf, clean());
    let report = orchestrator(reg, EngineSettings::default())
        .scan(&request(&["insufficient_logging", "csrf", "ssrf", "sql_injection"]))
        .await;
    assert_eq!(report.detected_vulnerabilities, vec!["sql_injection", "csrf", "insufficient_logging"]);
    assert!(!report.recommendations.contains_key("ssrf"));
}

#[tokio::test]
async fn slow_probe_times_out_without_holding_the_request() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Xxe, vulnerable(10_000));
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    let settings = EngineSettings { concurrency: 5, probe_timeout: Duration::from_millis(100) };
    let started = Instant::now();
    let report = orchestrator(reg, settings).scan(&request(&["xxe", "xss"])).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.detected_vulnerabilities, vec!["xss"]);
    let errors = &report.warnings.as_ref().unwrap().scan_errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].vulnerability, "xxe");
    assert_eq!(errors[0].error, "Scan for xxe timed out");
    assert_summary_laws(&report, 2);
}

struct Unavailable;

#[async_trait]
impl PersistenceSink for Unavailable {
    async fn store(&self, _record: &AuditRecord) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

#[tokio::test]
async fn persistence_failure_does_not_change_the_report() {
    let build = || {
        let mut reg = ProbeRegistry::new();
        reg.register(VulnerabilityId::Xss, vulnerable(0));
        reg.register(VulnerabilityId::Csrf, failing("boom"));
        reg
    };
    let req = request(&["xss", "csrf", "nope"]);
    let mut ok = orchestrator(build(), EngineSettings::default()).scan(&req).await;
    let mut broken = orchestrator(build(), EngineSettings::default())
        .with_sink(Arc::new(Unavailable))
        .scan(&req)
        .await;
    ok.scan_timestamp.clear();
    broken.scan_timestamp.clear();
    assert_eq!(ok, broken);
}

#[tokio::test]
async fn duplicate_ids_collapse_to_one_outcome() {
    // Documents current behavior: the outcome map holds one entry per distinct id,
    // while every unsupported occurrence is listed.
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    let report = orchestrator(reg, EngineSettings::default())
        .scan(&request(&["xss", "xss", "nope", "nope"]))
        .await;
    let s = report.scan_summary;
    assert_eq!(s.total, 4);
    assert_eq!(s.completed, 1);
    assert_eq!(s.unsupported, 2);
    assert_eq!(report.detected_vulnerabilities, vec!["xss"]);
    assert_eq!(report.warnings.unwrap().unsupported_vulnerabilities, vec!["nope", "nope"]);
}

#[tokio::test]
async fn isolated_scan_returns_report() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    let orch = orchestrator(reg, EngineSettings::default());
    let report = orch.scan_isolated(request(&["xss"])).await.unwrap();
    assert_eq!(report.url, "http://example.com");
    assert_eq!(report.scan_summary.vulnerabilities_found, 1);
}

#[tokio::test]
async fn tracked_scan_hands_back_the_audit_write() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Xss, clean());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = orchestrator(reg, EngineSettings::default()).with_sink(Arc::new(Recording(tx)));
    let (report, persisted) = orch.scan_tracked(&request(&["xss"])).await;
    assert!(report.detected_vulnerabilities.is_empty());
    persisted.await.unwrap();
    let record = rx.try_recv().unwrap();
    assert_eq!(record.url, "http://example.com");
}

#[tokio::test]
async fn severity_overrides_reorder_findings() {
    let mut reg = ProbeRegistry::new();
    reg.register(VulnerabilityId::Xss, vulnerable(0));
    reg.register(VulnerabilityId::Csrf, vulnerable(0));
    let table = SeverityTable::standard()
        .with_overrides([(VulnerabilityId::Csrf, Severity::High), (VulnerabilityId::Xss, Severity::Low)]);
    let orch = Orchestrator::new(Arc::new(reg), Arc::new(table), EngineSettings::default());
    let report = orch.scan(&request(&["xss", "csrf"])).await;
    assert_eq!(report.detected_vulnerabilities, vec!["csrf", "xss"]);
    assert_eq!(report.recommendations["xss"].severity, Severity::Low);
}
