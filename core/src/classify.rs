use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::Aggregate;
use crate::severity::{Severity, SeverityTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub message: String,
    pub details: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Detected ids, high before medium before low, request order within a bucket.
    pub detected: Vec<String>,
    pub recommendations: BTreeMap<String, Recommendation>,
}

/// Order detected findings by severity and attach recommendations. Only `Detected`
/// outcomes contribute.
pub fn classify(aggregate: &Aggregate, table: &SeverityTable) -> Classification {
    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();
    let mut recommendations = BTreeMap::new();

    for (id, finding) in aggregate.detected() {
        let severity = table.severity_of(id);
        match severity {
            Severity::High => high.push(id.to_string()),
            Severity::Medium => medium.push(id.to_string()),
            Severity::Low => low.push(id.to_string()),
        }
        recommendations.insert(
            id.to_string(),
            Recommendation {
                severity,
                message: format!("Detected Vulnerability: {}", id),
                details: finding
                    .details
                    .clone()
                    .unwrap_or_else(|| format!("The scan detected a {} vulnerability.", id)),
                remediation: finding
                    .recommendation
                    .clone()
                    .unwrap_or_else(|| "Please consult security guidelines for remediation.".to_string()),
            },
        );
    }

    high.extend(medium);
    high.extend(low);
    Classification { detected: high, recommendations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ResultAggregator;
    use crate::model::{ProbeFinding, ProbeOutcome};

    #[test]
    fn orders_by_bucket_then_request_order() {
        let mut agg = ResultAggregator::default();
        agg.record("insufficient_logging", ProbeOutcome::Detected(ProbeFinding::vulnerable()));
        agg.record("csrf", ProbeOutcome::Detected(ProbeFinding::vulnerable()));
        agg.record("xss", ProbeOutcome::Detected(ProbeFinding::vulnerable()));
        agg.record("ssrf", ProbeOutcome::Clean(ProbeFinding::clean()));
        agg.record("sql_injection", ProbeOutcome::Detected(ProbeFinding::vulnerable()));
        let c = classify(&agg.finish(), &SeverityTable::standard());
        assert_eq!(c.detected, vec!["xss", "sql_injection", "csrf", "insufficient_logging"]);
        assert!(!c.recommendations.contains_key("ssrf"));
    }

    #[test]
    fn recommendation_uses_finding_text_or_fallbacks() {
        let mut agg = ResultAggregator::default();
        agg.record(
            "xss",
            ProbeOutcome::Detected(
                ProbeFinding::vulnerable().with_details("reflected marker").with_recommendation("encode output"),
            ),
        );
        agg.record("csrf", ProbeOutcome::Detected(ProbeFinding::vulnerable()));
        let c = classify(&agg.finish(), &SeverityTable::standard());

        let xss = &c.recommendations["xss"];
        assert_eq!(xss.severity, Severity::High);
        assert_eq!(xss.message, "Detected Vulnerability: xss");
        assert_eq!(xss.details, "reflected marker");
        assert_eq!(xss.remediation, "encode output");

        let csrf = &c.recommendations["csrf"];
        assert_eq!(csrf.details, "The scan detected a csrf vulnerability.");
        assert_eq!(csrf.remediation, "Please consult security guidelines for remediation.");
    }
}
