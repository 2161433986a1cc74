//! Pure projections from session snapshots to display material.
//!
//! Nothing here touches the coordinator or the network: give it a
//! [`ScanSession`] and it answers what a shell should show. Display
//! fallbacks for sparse findings live here, not in the model, so the wire
//! shapes stay honest.

use redscan_model::{
    finding::{Classification, Finding, Severity},
    ids::ScanId,
    session::SessionStatus,
    timeline::Timeline,
};

use crate::error::SessionFailure;
use crate::session::ScanSession;

/// Locator for a scan's rendered PDF report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRef {
    pub scan_id: ScanId,
}

impl ReportRef {
    pub fn new(scan_id: ScanId) -> Self {
        Self { scan_id }
    }

    /// Service path of the report, relative to the HTTP base.
    pub fn path(&self) -> String {
        format!("/scan/{}/report", self.scan_id)
    }

    /// Filename the service suggests for downloads.
    pub fn suggested_filename(&self) -> String {
        let id = self.scan_id.as_str();
        format!("scan_{}_report.pdf", &id[..8])
    }
}

/// One finding prepared for display, every column non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingView {
    pub title: String,
    pub owasp: String,
    pub severity: String,
    pub classification: Classification,
    pub confidence_percent: u8,
    pub explanation: String,
    pub mitigation: String,
    pub evidence: Option<String>,
}

impl From<&Finding> for FindingView {
    fn from(finding: &Finding) -> Self {
        let title = if finding.attack.trim().is_empty() {
            "Vulnerability".to_string()
        } else {
            finding.attack.clone()
        };

        Self {
            title,
            owasp: finding
                .owasp_reference
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            severity: finding
                .severity
                .map(|severity| severity.label().to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            classification: finding.classification(),
            confidence_percent: finding.confidence_percent(),
            explanation: finding
                .explanation
                .clone()
                .unwrap_or_else(|| "No explanation available".to_string()),
            mitigation: finding
                .mitigation
                .clone()
                .unwrap_or_else(|| "No mitigation available".to_string()),
            evidence: finding.evidence.clone(),
        }
    }
}

/// Aggregate counts over a result set.
///
/// `failed` counts findings classified vulnerable; everything else counts as
/// passed, including manual-check and errored findings. Severity counts use
/// the effective severity, so findings without one land in `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub failed: usize,
    pub passed: usize,
    pub total: usize,
}

impl ScanSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for finding in findings {
            summary.total += 1;
            match finding.effective_severity() {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info | Severity::Unknown => summary.info += 1,
            }
            if finding.is_vulnerable() {
                summary.failed += 1;
            } else {
                summary.passed += 1;
            }
        }
        summary
    }

    pub fn has_vulnerabilities(&self) -> bool {
        self.failed > 0
    }
}

/// What a shell should show for a session snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanView {
    /// Nothing started yet.
    Idle,
    /// A scan is underway; show the timeline and latest progress line.
    InProgress {
        status: SessionStatus,
        timeline: Timeline,
        percent: Option<u8>,
        detail: Option<String>,
        target: Option<String>,
    },
    /// The session failed for lack of a credential; show a login prompt.
    LoginRequired,
    /// The scan failed; `detail` is the service's text, verbatim.
    Failed { detail: String, timeline: Timeline },
    /// The attempt was cancelled before it resolved.
    Cancelled,
    /// The scan succeeded with zero findings. The report is still offered;
    /// an all-clear is a result worth keeping.
    Empty { report: Option<ReportRef> },
    /// The scan succeeded with findings.
    Report {
        findings: Vec<FindingView>,
        summary: ScanSummary,
        report: Option<ReportRef>,
    },
}

/// Report locator for a session, if one can be offered.
///
/// Only a succeeded session with a server-assigned id has a report; results
/// content plays no part. Sessions produced by the coordinator always carry
/// an id on success.
pub fn report_reference(session: &ScanSession) -> Option<ReportRef> {
    if session.status != SessionStatus::Succeeded {
        return None;
    }
    session.scan_id.map(ReportRef::new)
}

/// Project a session snapshot into display form.
pub fn render(session: &ScanSession) -> ScanView {
    match session.status {
        SessionStatus::Idle => ScanView::Idle,
        SessionStatus::Starting | SessionStatus::Running => {
            ScanView::InProgress {
                status: session.status,
                timeline: session.timeline.clone(),
                percent: session.percent,
                detail: session.detail.clone(),
                target: session.target.clone(),
            }
        }
        SessionStatus::Cancelled => ScanView::Cancelled,
        SessionStatus::Failed => match &session.failure {
            Some(SessionFailure::AuthRequired) => ScanView::LoginRequired,
            Some(failure) => ScanView::Failed {
                detail: failure.to_string(),
                timeline: session.timeline.clone(),
            },
            None => ScanView::Failed {
                detail: "scan failed".to_string(),
                timeline: session.timeline.clone(),
            },
        },
        SessionStatus::Succeeded => {
            let report = report_reference(session);
            if session.results.is_empty() {
                ScanView::Empty { report }
            } else {
                ScanView::Report {
                    findings: session
                        .results
                        .iter()
                        .map(FindingView::from)
                        .collect(),
                    summary: ScanSummary::from_findings(&session.results),
                    report,
                }
            }
        }
    }
}
