//! HTTP-backed probes for the scan engine.
//!
//! Passive probes issue one GET and inspect headers, cookies and markup.
//! Active probes mutate the query string once and look for a reflected marker
//! or a database error signature.

mod active;
mod fetch;
mod passive;

pub use active::{ReflectionProbe, SqlErrorProbe};
pub use fetch::{fetch_page, Page};
pub use passive::{
    check_cookies, check_csrf_forms, check_security_headers, check_transport, check_version_disclosure,
    PassiveCheck, PassiveProbe,
};

use anyhow::Result;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use vulnscan_core::{ProbeRegistry, VulnerabilityId};

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout_ms: u64,
    pub redirects: usize,
    pub user_agent: String,
    /// Response bodies are truncated past this many bytes.
    pub body_limit: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            timeout_ms: 10_000,
            redirects: 5,
            user_agent: concat!("vulnscan/", env!("CARGO_PKG_VERSION")).to_string(),
            body_limit: 512 * 1024,
        }
    }
}

pub fn build_client(opts: &ProbeOptions) -> Result<Client> {
    let client = Client::builder()
        .redirect(Policy::limited(opts.redirects))
        .timeout(Duration::from_millis(opts.timeout_ms))
        .user_agent(opts.user_agent.clone())
        .brotli(true)
        .gzip(true)
        .deflate(true)
        .build()?;
    Ok(client)
}

/// Register every built-in probe, sharing one client.
pub fn register_defaults(registry: &mut ProbeRegistry, opts: &ProbeOptions) -> Result<()> {
    let client = build_client(opts)?;
    let passive: [(VulnerabilityId, PassiveCheck); 5] = [
        (VulnerabilityId::SecurityMisconfiguration, check_security_headers),
        (VulnerabilityId::SensitiveDataExposure, check_transport),
        (VulnerabilityId::VulnerableComponents, check_version_disclosure),
        (VulnerabilityId::BrokenAuthentication, check_cookies),
        (VulnerabilityId::Csrf, check_csrf_forms),
    ];
    for (id, check) in passive {
        registry.register(id, PassiveProbe::new(client.clone(), check, opts.body_limit));
    }
    registry.register_arc(VulnerabilityId::Xss, Arc::new(ReflectionProbe::new(client.clone(), opts.body_limit)));
    registry.register_arc(VulnerabilityId::SqlInjection, Arc::new(SqlErrorProbe::new(client, opts.body_limit)?));
    tracing::debug!(probes = registry.len(), "registered built-in probes");
    Ok(())
}
