use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vulnscan_core::{EngineSettings, Severity, SeverityTable, VulnerabilityId};
use web_probes::ProbeOptions;

pub const DEFAULT_CONFIG_FILE: &str = "vulnscan.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub body_limit_bytes: Option<usize>,
    pub requests_per_window: Option<u32>,
    pub window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub scan: Option<ScanConfig>,
    pub database: Option<DatabaseConfig>,
    /// Per-id severity overrides, e.g. `csrf: high`.
    pub severity: Option<BTreeMap<String, Severity>>,
}

/// Explicit path must exist and parse. Without one, `./vulnscan.yaml` is used when present.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = parse_config(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(cfg))
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(serde_yaml::from_str(s)?)
}

/// Values given on the command line. `None` falls through to config, then defaults.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub bind: Option<String>,
    pub db: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub body_limit: usize,
    pub requests_per_window: u32,
    pub window: Duration,
    pub engine: EngineSettings,
    pub probes: ProbeOptions,
    pub db_path: PathBuf,
    pub severity: SeverityTable,
}

impl Settings {
    pub fn resolve(cfg: Option<&Config>, o: &Overrides) -> Result<Settings> {
        let server = cfg.and_then(|c| c.server.clone()).unwrap_or_default();
        let scan = cfg.and_then(|c| c.scan.clone()).unwrap_or_default();
        let database = cfg.and_then(|c| c.database.clone()).unwrap_or_default();

        let engine_defaults = EngineSettings::default();
        let probe_defaults = ProbeOptions::default();
        let engine = EngineSettings {
            concurrency: o.concurrency.or(scan.concurrency).unwrap_or(engine_defaults.concurrency).max(1),
            probe_timeout: o
                .timeout_ms
                .or(scan.timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(engine_defaults.probe_timeout),
        };
        let probes = ProbeOptions {
            timeout_ms: scan.request_timeout_ms.unwrap_or(probe_defaults.timeout_ms),
            user_agent: scan.user_agent.unwrap_or(probe_defaults.user_agent),
            ..probe_defaults
        };

        let mut overrides = Vec::new();
        if let Some(map) = cfg.and_then(|c| c.severity.as_ref()) {
            for (key, bucket) in map {
                let id: VulnerabilityId = key.parse().map_err(|_| anyhow!("unknown vulnerability in severity map: {key}"))?;
                overrides.push((id, *bucket));
            }
        }

        Ok(Settings {
            bind: o.bind.clone().or(server.bind).unwrap_or_else(|| "127.0.0.1:5000".to_string()),
            body_limit: server.body_limit_bytes.unwrap_or(10 * 1024),
            requests_per_window: server.requests_per_window.unwrap_or(100),
            window: Duration::from_secs(server.window_secs.unwrap_or(15 * 60)),
            engine,
            probes,
            db_path: o.db.clone().or(database.path).unwrap_or_else(|| PathBuf::from("vulnscan.db")),
            severity: SeverityTable::standard().with_overrides(overrides),
        })
    }
}
