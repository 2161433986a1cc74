use crate::finding::Finding;
use crate::ids::ScanId;

/// Target categories accepted by the scan endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Llm,
    Api,
    Quick,
    Full,
}

/// Body of `POST /scan`.
///
/// `target_id` is either a dataset identifier or a live URL; the service
/// decides which by inspecting the value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScanRequest {
    pub target_id: String,
    pub target_type: TargetType,
}

impl ScanRequest {
    pub fn new(target_id: impl Into<String>, target_type: TargetType) -> Self {
        ScanRequest {
            target_id: target_id.into(),
            target_type,
        }
    }

    pub fn llm(target_id: impl Into<String>) -> Self {
        Self::new(target_id, TargetType::Llm)
    }
}

/// Success body of `POST /scan`.
///
/// The service also returns its full profiling and attack-plan internals;
/// only the fields this client consumes are modeled, the rest are ignored on
/// deserialization. `scan_id` stays optional at this layer so a defective
/// body still parses; the request executor is the one that rejects it.
///
/// `timestamp` is kept verbatim: the service emits naive ISO 8601 with no
/// offset, which is display material, not arithmetic material.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct ScanResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<ScanId>,
    #[serde(default)]
    pub results: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default)]
    pub is_live_scan: bool,
}

/// One row of `GET /scans`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanListEntry {
    pub scan_id: ScanId,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub is_live_scan: bool,
}

/// Error body the service attaches to non-success statuses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ApiErrorBody {
    pub detail: String,
}
