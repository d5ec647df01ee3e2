//! Client-facing scan report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::aggregate::Aggregate;
use crate::classify::{Classification, Recommendation};

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total: usize,
    pub completed: usize,
    pub vulnerabilities_found: usize,
    pub failed: usize,
    pub unsupported: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanErrorEntry {
    pub vulnerability: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warnings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scan_errors: Vec<ScanErrorEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported_vulnerabilities: Vec<String>,
}

impl Warnings {
    pub fn is_empty(&self) -> bool {
        self.scan_errors.is_empty() && self.unsupported_vulnerabilities.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub url: String,
    pub scan_timestamp: String,
    pub detected_vulnerabilities: Vec<String>,
    pub recommendations: BTreeMap<String, Recommendation>,
    pub scan_summary: ScanSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Warnings>,
}

/// Assemble the final report. `warnings` is present only when there is something
/// to warn about.
pub fn compose(
    url: &str,
    requested: usize,
    aggregate: &Aggregate,
    classification: Classification,
    scan_timestamp: String,
) -> ScanReport {
    let failed = aggregate.failed();
    let warnings = Warnings {
        scan_errors: failed
            .iter()
            .map(|f| ScanErrorEntry { vulnerability: f.id.clone(), error: f.error.clone() })
            .collect(),
        unsupported_vulnerabilities: aggregate.unsupported().to_vec(),
    };
    let scan_summary = ScanSummary {
        total: requested,
        completed: aggregate.dispatched(),
        vulnerabilities_found: classification.detected.len(),
        failed: failed.len(),
        unsupported: aggregate.unsupported().len(),
    };
    ScanReport {
        url: url.to_string(),
        scan_timestamp,
        detected_vulnerabilities: classification.detected,
        recommendations: classification.recommendations,
        scan_summary,
        warnings: (!warnings.is_empty()).then_some(warnings),
    }
}
