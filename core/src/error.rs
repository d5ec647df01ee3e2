use thiserror::Error;

/// Request-level validation failures. Fatal to the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A valid URL is required to perform the scan")]
    MissingUrl,
    #[error("Please provide an array of vulnerability types to scan for")]
    InvalidVulnerabilities,
}

impl ValidationError {
    /// Short label used as the `error` field of a 400 response.
    pub fn label(&self) -> &'static str {
        match self {
            ValidationError::MissingUrl => "Missing URL parameter",
            ValidationError::InvalidVulnerabilities => "Invalid vulnerabilities parameter",
        }
    }
}

/// Failures surfaced by the orchestrator itself. Probe failures never show up here;
/// they are converted to outcomes at the timeout guard.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan task failed: {0}")]
    Internal(String),
}
