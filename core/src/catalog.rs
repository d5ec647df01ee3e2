//! Closed set of vulnerability identifiers and the predefined scan profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every check the service knows how to name. Requested ids that do not parse
/// into one of these are reported as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityId {
    // OWASP Top 10
    SqlInjection,
    Xss,
    BrokenAuthentication,
    SensitiveDataExposure,
    Xxe,
    InsecureDeserialization,
    SecurityMisconfiguration,
    AccessControlIssues,
    Csrf,
    VulnerableComponents,
    // SANS Top 25
    PathTraversal,
    IntegerOverflow,
    FileUpload,
    HardcodedCredentials,
    OutputNeutralization,
    MissingAuthentication,
    BufferOverflow,
    MemoryBuffer,
    ResourceConsumption,
    InputValidation,
    RaceCondition,
    CertificateValidation,
    PrivilegeManagement,
    Authorization,
    UseAfterFree,
    InsecureDesign,
    InsufficientLogging,
    Ssrf,
    // Advanced
    HostHeaderInjection,
    JwtVulnerabilities,
    PrototypePollution,
    NosqlInjection,
    ServerSideTemplateInjection,
}

impl VulnerabilityId {
    pub const ALL: &'static [VulnerabilityId] = &[
        Self::SqlInjection,
        Self::Xss,
        Self::BrokenAuthentication,
        Self::SensitiveDataExposure,
        Self::Xxe,
        Self::InsecureDeserialization,
        Self::SecurityMisconfiguration,
        Self::AccessControlIssues,
        Self::Csrf,
        Self::VulnerableComponents,
        Self::PathTraversal,
        Self::IntegerOverflow,
        Self::FileUpload,
        Self::HardcodedCredentials,
        Self::OutputNeutralization,
        Self::MissingAuthentication,
        Self::BufferOverflow,
        Self::MemoryBuffer,
        Self::ResourceConsumption,
        Self::InputValidation,
        Self::RaceCondition,
        Self::CertificateValidation,
        Self::PrivilegeManagement,
        Self::Authorization,
        Self::UseAfterFree,
        Self::InsecureDesign,
        Self::InsufficientLogging,
        Self::Ssrf,
        Self::HostHeaderInjection,
        Self::JwtVulnerabilities,
        Self::PrototypePollution,
        Self::NosqlInjection,
        Self::ServerSideTemplateInjection,
    ];

    /// Wire identifier, as accepted in scan requests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::Xss => "xss",
            Self::BrokenAuthentication => "broken_authentication",
            Self::SensitiveDataExposure => "sensitive_data_exposure",
            Self::Xxe => "xxe",
            Self::InsecureDeserialization => "insecure_deserialization",
            Self::SecurityMisconfiguration => "security_misconfiguration",
            Self::AccessControlIssues => "access_control_issues",
            Self::Csrf => "csrf",
            Self::VulnerableComponents => "vulnerable_components",
            Self::PathTraversal => "path_traversal",
            Self::IntegerOverflow => "integer_overflow",
            Self::FileUpload => "file_upload",
            Self::HardcodedCredentials => "hardcoded_credentials",
            Self::OutputNeutralization => "output_neutralization",
            Self::MissingAuthentication => "missing_authentication",
            Self::BufferOverflow => "buffer_overflow",
            Self::MemoryBuffer => "memory_buffer",
            Self::ResourceConsumption => "resource_consumption",
            Self::InputValidation => "input_validation",
            Self::RaceCondition => "race_condition",
            Self::CertificateValidation => "certificate_validation",
            Self::PrivilegeManagement => "privilege_management",
            Self::Authorization => "authorization",
            Self::UseAfterFree => "use_after_free",
            Self::InsecureDesign => "insecure_design",
            Self::InsufficientLogging => "insufficient_logging",
            Self::Ssrf => "ssrf",
            Self::HostHeaderInjection => "host_header_injection",
            Self::JwtVulnerabilities => "jwt_vulnerabilities",
            Self::PrototypePollution => "prototype_pollution",
            Self::NosqlInjection => "nosql_injection",
            Self::ServerSideTemplateInjection => "server_side_template_injection",
        }
    }

    /// Human readable title shown by the catalog endpoint.
    pub const fn title(self) -> &'static str {
        match self {
            Self::SqlInjection => "Injection",
            Self::Xss => "Cross-Site Scripting (XSS)",
            Self::BrokenAuthentication => "Identification and Authentication Failures",
            Self::SensitiveDataExposure => "Cryptographic Failures",
            Self::Xxe => "XML External Entities (XXE)",
            Self::InsecureDeserialization => "Software and Data Integrity Failures",
            Self::SecurityMisconfiguration => "Security Misconfiguration",
            Self::AccessControlIssues => "Broken Access Control",
            Self::Csrf => "Cross-Site Request Forgery (CSRF)",
            Self::VulnerableComponents => "Vulnerable and Outdated Components",
            Self::PathTraversal => "Path Traversal",
            Self::IntegerOverflow => "Integer Overflow or Wraparound",
            Self::FileUpload => "Unrestricted Upload of File with Dangerous Type",
            Self::HardcodedCredentials => "Use of Hard-coded Credentials",
            Self::OutputNeutralization => "Improper Neutralization of Special Elements in Output",
            Self::MissingAuthentication => "Missing Authentication for Critical Function",
            Self::BufferOverflow => "Buffer Overflow",
            Self::MemoryBuffer => "Improper Restriction of Operations within Memory Buffer",
            Self::ResourceConsumption => "Uncontrolled Resource Consumption",
            Self::InputValidation => "Improper Input Validation",
            Self::RaceCondition => "Race Condition",
            Self::CertificateValidation => "Improper Certificate Validation",
            Self::PrivilegeManagement => "Improper Privilege Management",
            Self::Authorization => "Incorrect Authorization",
            Self::UseAfterFree => "Use After Free",
            Self::InsecureDesign => "Insecure Design",
            Self::InsufficientLogging => "Security Logging and Monitoring Failures",
            Self::Ssrf => "Server-Side Request Forgery (SSRF)",
            Self::HostHeaderInjection => "Host Header Injection",
            Self::JwtVulnerabilities => "JWT Vulnerabilities",
            Self::PrototypePollution => "Prototype Pollution",
            Self::NosqlInjection => "NoSQL Injection",
            Self::ServerSideTemplateInjection => "Server Side Template Injection",
        }
    }
}

impl fmt::Display for VulnerabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown vulnerability id: {0}")]
pub struct UnknownVulnerability(pub String);

impl FromStr for VulnerabilityId {
    type Err = UnknownVulnerability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownVulnerability(s.to_string()))
    }
}

/// A named, predefined selection of checks.
#[derive(Debug, Clone, Serialize)]
pub struct ScanProfile {
    pub key: &'static str,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<VulnerabilityId>,
}

const OWASP_TOP_10: &[VulnerabilityId] = &[
    VulnerabilityId::AccessControlIssues,
    VulnerabilityId::SensitiveDataExposure,
    VulnerabilityId::SqlInjection,
    VulnerabilityId::InsecureDesign,
    VulnerabilityId::SecurityMisconfiguration,
    VulnerabilityId::VulnerableComponents,
    VulnerabilityId::BrokenAuthentication,
    VulnerabilityId::InsecureDeserialization,
    VulnerabilityId::InsufficientLogging,
    VulnerabilityId::Ssrf,
];

const SANS_EXTRA: &[VulnerabilityId] = &[
    VulnerabilityId::Xss,
    VulnerabilityId::Csrf,
    VulnerabilityId::Xxe,
    VulnerabilityId::PathTraversal,
    VulnerabilityId::IntegerOverflow,
    VulnerabilityId::FileUpload,
    VulnerabilityId::HardcodedCredentials,
    VulnerabilityId::OutputNeutralization,
    VulnerabilityId::MissingAuthentication,
    VulnerabilityId::BufferOverflow,
    VulnerabilityId::MemoryBuffer,
    VulnerabilityId::ResourceConsumption,
    VulnerabilityId::InputValidation,
    VulnerabilityId::RaceCondition,
    VulnerabilityId::CertificateValidation,
    VulnerabilityId::PrivilegeManagement,
    VulnerabilityId::Authorization,
    VulnerabilityId::UseAfterFree,
];

const ADVANCED: &[VulnerabilityId] = &[
    VulnerabilityId::HostHeaderInjection,
    VulnerabilityId::JwtVulnerabilities,
    VulnerabilityId::PrototypePollution,
    VulnerabilityId::NosqlInjection,
    VulnerabilityId::ServerSideTemplateInjection,
];

/// Predefined profiles: owasp, sans (owasp plus SANS extras), advanced, custom (empty).
pub fn profiles() -> Vec<ScanProfile> {
    vec![
        ScanProfile { key: "owasp", name: "OWASP Top 10 Scan", vulnerabilities: OWASP_TOP_10.to_vec() },
        ScanProfile {
            key: "sans",
            name: "SANS Top 25 Scan",
            vulnerabilities: OWASP_TOP_10.iter().chain(SANS_EXTRA).copied().collect(),
        },
        ScanProfile { key: "advanced", name: "Advanced Vulnerabilities Scan", vulnerabilities: ADVANCED.to_vec() },
        ScanProfile { key: "custom", name: "Custom Scan", vulnerabilities: Vec::new() },
    ]
}

/// Look up a profile by its key.
pub fn profile(key: &str) -> Option<ScanProfile> {
    profiles().into_iter().find(|p| p.key == key)
}
