use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use vulnscan_core::catalog::profile;
use vulnscan_core::ratelimiter::RateLimiter;
use vulnscan_core::{Orchestrator, PersistenceSink, ProbeRegistry, ScanReport, ScanRequest, VulnerabilityId};

mod api;
mod config;
mod sink;

use config::{Overrides, Settings};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json }

#[derive(Debug, Parser)]
#[command(name = "vulnscan", version, about = "Web vulnerability scanning service")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./vulnscan.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset (e.g. info, debug, vulnscan_core=trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// List known checks, their severity and whether a probe is built in
    Checks,
    /// Run the HTTP API
    Serve {
        /// Listen address, e.g. 127.0.0.1:5000
        #[arg(long)]
        bind: Option<String>,
        /// SQLite audit database path
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,
        /// Probes dispatched per chunk
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-probe deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Scan one URL from the command line
    Scan {
        /// Target URL
        url: String,
        /// Comma-separated check ids (e.g. xss,sql_injection)
        #[arg(long, value_delimiter = ',')]
        checks: Vec<String>,
        /// Add every check of a predefined profile (owasp, sans, advanced)
        #[arg(long)]
        profile: Option<String>,
        /// Probes dispatched per chunk
        #[arg(long)]
        concurrency: Option<usize>,
        /// Per-probe deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Write CSV instead of text/json when --out is provided
        #[arg(long, default_value_t = false)]
        csv: bool,
        /// Record the scan in the audit database
        #[arg(long, default_value_t = false)]
        store: bool,
        /// SQLite audit database path (with --store)
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn build_registry(settings: &Settings) -> Result<Arc<ProbeRegistry>> {
    let mut registry = ProbeRegistry::new();
    web_probes::register_defaults(&mut registry, &settings.probes)?;
    Ok(Arc::new(registry))
}

fn open_db(settings: &Settings) -> Result<sink::SharedDb> {
    let db = results_sqlite::Db::open_or_create(&settings.db_path)
        .with_context(|| format!("opening audit database {}", settings.db_path.display()))?;
    Ok(Arc::new(Mutex::new(db)))
}

fn build_orchestrator(settings: &Settings, sink: Option<Arc<dyn PersistenceSink>>) -> Result<Orchestrator> {
    let orchestrator = Orchestrator::new(build_registry(settings)?, Arc::new(settings.severity.clone()), settings.engine);
    Ok(match sink {
        Some(s) => orchestrator.with_sink(s),
        None => orchestrator,
    })
}

/// `--checks` first, then profile members not already listed.
fn requested_checks(checks: Vec<String>, profile_key: Option<&str>) -> Result<Vec<String>> {
    let mut ids: Vec<String> = checks.into_iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect();
    if let Some(key) = profile_key {
        let p = profile(key).ok_or_else(|| anyhow!("unknown profile {key}"))?;
        for id in p.vulnerabilities {
            if !ids.iter().any(|c| c == id.as_str()) {
                ids.push(id.as_str().to_string());
            }
        }
    }
    Ok(ids)
}

fn render_text(report: &ScanReport) -> String {
    let s = &report.scan_summary;
    let mut out = format!(
        "{} @ {}\nchecks: {} total, {} completed, {} found, {} failed, {} unsupported\n",
        report.url, report.scan_timestamp, s.total, s.completed, s.vulnerabilities_found, s.failed, s.unsupported
    );
    for id in &report.detected_vulnerabilities {
        if let Some(r) = report.recommendations.get(id) {
            out.push_str(&format!("[{}] {}: {}\n    {}\n", r.severity, id, r.details, r.remediation));
        }
    }
    if let Some(w) = &report.warnings {
        for e in &w.scan_errors {
            out.push_str(&format!("error: {}: {}\n", e.vulnerability, e.error));
        }
        if !w.unsupported_vulnerabilities.is_empty() {
            out.push_str(&format!("unsupported: {}\n", w.unsupported_vulnerabilities.join(", ")));
        }
    }
    out
}

fn write_csv<W: Write>(w: W, report: &ScanReport) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["url", "scan_timestamp", "vulnerability", "severity", "message", "details", "remediation"])?;
    for id in &report.detected_vulnerabilities {
        if let Some(r) = report.recommendations.get(id) {
            wtr.write_record([
                report.url.as_str(),
                report.scan_timestamp.as_str(),
                id.as_str(),
                r.severity.as_str(),
                r.message.as_str(),
                r.details.as_str(),
                r.remediation.as_str(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("vulnscan {} (core {})", env!("CARGO_PKG_VERSION"), vulnscan_core::version());
        }
        Commands::Checks => {
            let settings = Settings::resolve(loaded_cfg.as_ref(), &Overrides::default())?;
            let registry = build_registry(&settings)?;
            for &id in VulnerabilityId::ALL {
                let mark = if registry.contains(id) { "probe" } else { "-" };
                println!("{:<32} {:<7} {:<6} {}", id.as_str(), settings.severity.severity(id).as_str(), mark, id.title());
            }
        }
        Commands::Serve { bind, db, concurrency, timeout_ms } => {
            let settings = Settings::resolve(loaded_cfg.as_ref(), &Overrides { bind, db, concurrency, timeout_ms })?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async move {
                let db = open_db(&settings)?;
                let orchestrator = build_orchestrator(&settings, Some(Arc::new(sink::SqliteSink::new(db.clone()))))?;
                let limiter = RateLimiter::new(settings.requests_per_window, settings.window);
                let app = api::router(api::AppState { orchestrator, limiter, db }, settings.body_limit);
                let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
                tracing::info!(
                    bind = %settings.bind,
                    db = %settings.db_path.display(),
                    concurrency = settings.engine.concurrency,
                    timeout_ms = settings.engine.probe_timeout.as_millis() as u64,
                    "server listening"
                );
                axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
                Ok::<_, anyhow::Error>(())
            })?;
        }
        Commands::Scan { url, checks, profile, concurrency, timeout_ms, format, out, csv, store, db } => {
            let settings = Settings::resolve(loaded_cfg.as_ref(), &Overrides { bind: None, db, concurrency, timeout_ms })?;
            let ids = requested_checks(checks, profile.as_deref())?;
            let request = ScanRequest::new(url, ids).map_err(|e| anyhow!("{}: {e}", e.label()))?;
            let rt = tokio::runtime::Runtime::new()?;
            let report = rt.block_on(async {
                let sink: Option<Arc<dyn PersistenceSink>> = if store {
                    Some(Arc::new(sink::SqliteSink::new(open_db(&settings)?)))
                } else {
                    None
                };
                let orchestrator = build_orchestrator(&settings, sink)?;
                let (report, persisted) = orchestrator.scan_tracked(&request).await;
                // the audit write must land before the runtime goes away
                persisted.await?;
                Ok::<_, anyhow::Error>(report)
            })?;
            if let Some(path) = out {
                let file = std::fs::File::create(&path)?;
                if csv {
                    write_csv(file, &report)?;
                } else {
                    let mut w = std::io::BufWriter::new(file);
                    match format {
                        OutputFormat::Json => writeln!(w, "{}", serde_json::to_string_pretty(&report)?)?,
                        OutputFormat::Text => write!(w, "{}", render_text(&report))?,
                    }
                    w.flush()?;
                }
            } else {
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                    OutputFormat::Text => print!("{}", render_text(&report)),
                }
            }
        }
    }
    Ok(())
}
