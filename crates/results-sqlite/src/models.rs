use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A scan about to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScan {
    pub scan_id: Uuid,
    pub url: String,
    pub vulnerabilities: Vec<String>,
    pub results: serde_json::Value,
    pub created_at_ms: i64,
}

impl NewScan {
    /// Stamp a new record with a time-ordered id and the current time.
    pub fn now(url: impl Into<String>, vulnerabilities: Vec<String>, results: serde_json::Value) -> Self {
        NewScan { scan_id: Uuid::now_v7(), url: url.into(), vulnerabilities, results, created_at_ms: now_ms() }
    }
}

/// Summary row returned by history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRow {
    pub id: String,
    pub url: String,
    pub vulnerabilities: Vec<String>,
    pub created_at_ms: i64,
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
