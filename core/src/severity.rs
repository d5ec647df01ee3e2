use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::catalog::VulnerabilityId;

/// Severity bucket controlling report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static id -> severity mapping. Ids without an entry are `medium`.
#[derive(Debug, Clone, Default)]
pub struct SeverityTable {
    buckets: HashMap<VulnerabilityId, Severity>,
}

impl SeverityTable {
    /// OWASP/SANS-derived defaults.
    pub fn standard() -> Self {
        use VulnerabilityId::*;
        let mut buckets = HashMap::new();
        for id in [
            SqlInjection,
            Xss,
            Xxe,
            BrokenAuthentication,
            InsecureDeserialization,
            AccessControlIssues,
            BufferOverflow,
            PathTraversal,
        ] {
            buckets.insert(id, Severity::High);
        }
        for id in [
            Csrf,
            SensitiveDataExposure,
            SecurityMisconfiguration,
            VulnerableComponents,
            HardcodedCredentials,
            MissingAuthentication,
        ] {
            buckets.insert(id, Severity::Medium);
        }
        buckets.insert(InsufficientLogging, Severity::Low);
        SeverityTable { buckets }
    }

    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (VulnerabilityId, Severity)>,
    {
        self.buckets.extend(overrides);
        self
    }

    pub fn severity(&self, id: VulnerabilityId) -> Severity {
        self.buckets.get(&id).copied().unwrap_or(Severity::Medium)
    }

    /// Bucket for a requested id string; unknown strings default to `medium`.
    pub fn severity_of(&self, requested: &str) -> Severity {
        requested.parse().map(|id| self.severity(id)).unwrap_or(Severity::Medium)
    }
}
