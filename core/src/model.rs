//! Request, finding and outcome types shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ValidationError;

/// An incoming scan request. Validated on construction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    url: String,
    vulnerability_ids: Vec<String>,
}

impl ScanRequest {
    pub fn new(url: impl Into<String>, vulnerability_ids: Vec<String>) -> Result<Self, ValidationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ValidationError::MissingUrl);
        }
        if vulnerability_ids.is_empty() {
            return Err(ValidationError::InvalidVulnerabilities);
        }
        Ok(ScanRequest { url, vulnerability_ids })
    }

    /// Validate a raw JSON body of the form `{ "url": "...", "vulnerabilities": [...] }`.
    ///
    /// Stricter than plain truthiness: a blank or non-string `url` and any
    /// non-string list entry are rejected here instead of being coerced into
    /// an unsupported check id.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let url = match body.get("url") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => return Err(ValidationError::MissingUrl),
        };
        let ids = match body.get("vulnerabilities") {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or(ValidationError::InvalidVulnerabilities)?,
            _ => return Err(ValidationError::InvalidVulnerabilities),
        };
        ScanRequest::new(url, ids)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn vulnerability_ids(&self) -> &[String] {
        &self.vulnerability_ids
    }

    pub fn len(&self) -> usize {
        self.vulnerability_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vulnerability_ids.is_empty()
    }
}

/// What a probe reports when it completes in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFinding {
    pub vulnerable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl ProbeFinding {
    pub fn vulnerable() -> Self {
        ProbeFinding { vulnerable: true, ..Default::default() }
    }

    pub fn clean() -> Self {
        ProbeFinding::default()
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Detected(ProbeFinding),
    Clean(ProbeFinding),
    TimedOut { after: Duration },
    ExecutionError(String),
    /// The id has no registered probe; never dispatched.
    Unsupported,
}

pub(crate) const UNKNOWN_ERROR: &str = "Unknown error occurred during scan";
const RETRY_ADVICE: &str = "Please try again or check the URL accessibility.";

impl ProbeOutcome {
    pub fn from_finding(finding: ProbeFinding) -> Self {
        if finding.vulnerable {
            ProbeOutcome::Detected(finding)
        } else {
            ProbeOutcome::Clean(finding)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProbeOutcome::TimedOut { .. } | ProbeOutcome::ExecutionError(_))
    }

    /// Message reported in `warnings.scanErrors` for a failed dispatch.
    pub fn failure_message(&self, id: &str) -> Option<String> {
        match self {
            ProbeOutcome::TimedOut { .. } => Some(format!("Scan for {} timed out", id)),
            ProbeOutcome::ExecutionError(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// Entry written to the audit record. Failed dispatches get a synthetic,
    /// non-vulnerable entry flagged with `error: true`.
    pub fn result_entry(&self, id: &str) -> Option<ResultEntry> {
        match self {
            ProbeOutcome::Detected(f) | ProbeOutcome::Clean(f) => Some(ResultEntry {
                vulnerable: f.vulnerable,
                error: false,
                details: f.details.clone(),
                recommendation: f.recommendation.clone(),
            }),
            ProbeOutcome::TimedOut { .. } | ProbeOutcome::ExecutionError(_) => {
                let msg = self.failure_message(id).unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                Some(ResultEntry {
                    vulnerable: false,
                    error: true,
                    details: Some(format!("Error scanning for {}: {}", id, msg)),
                    recommendation: Some(RETRY_ADVICE.to_string()),
                })
            }
            ProbeOutcome::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub vulnerable: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Raw request plus per-id results, handed to the persistence sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub url: String,
    pub vulnerabilities: Vec<String>,
    pub results: BTreeMap<String, ResultEntry>,
}
