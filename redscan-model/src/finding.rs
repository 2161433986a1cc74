use std::fmt;

/// Severity assigned to a finding by the rule that produced it.
///
/// Variant order doubles as display order: sorting findings by severity puts
/// the most critical first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    /// Forward-compatible catch-all for severities this client predates.
    #[serde(other)]
    Unknown,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Presentation class derived from a finding's raw status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Vulnerable,
    Secure,
    Passed,
    /// Anything unrecognized (`CHECK_MANUAL`, `ERROR`, future statuses).
    Warning,
}

/// One finding from a completed scan.
///
/// The pipeline's agents have shipped two generations of field names
/// (`attack`/`name`, `explanation`/`why`, `owasp_reference`/`owasp`); the
/// serde aliases accept both. `status` stays a raw string because the set of
/// emitted statuses is open-ended; [`Finding::classification`] folds it into
/// the four classes the UI styles.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Finding {
    #[serde(default, alias = "name")]
    pub attack: String,
    #[serde(default, alias = "owasp", skip_serializing_if = "Option::is_none")]
    pub owasp_reference: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, alias = "why", skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Finding {
    pub fn classification(&self) -> Classification {
        match self.status.as_str() {
            "VULNERABLE" => Classification::Vulnerable,
            "SECURE" => Classification::Secure,
            "PASSED" => Classification::Passed,
            _ => Classification::Warning,
        }
    }

    pub fn is_vulnerable(&self) -> bool {
        self.classification() == Classification::Vulnerable
    }

    /// Severity used for aggregate counting; absent and unrecognized
    /// severities count as informational.
    pub fn effective_severity(&self) -> Severity {
        match self.severity {
            Some(Severity::Unknown) | None => Severity::Info,
            Some(severity) => severity,
        }
    }

    /// Confidence as a whole percentage for display.
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}
