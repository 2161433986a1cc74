//! HTTP executor for the scan service.
//!
//! One request, one outcome: a scan submission either returns a complete
//! verdict or a typed error. There is no partial success and no retry here;
//! callers decide what a failure means for their session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use redscan_model::{
    finding::Finding,
    ids::ScanId,
    scan::{ApiErrorBody, ScanListEntry, ScanRequest, ScanResponse},
};

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{Result, ScanError};

/// Complete outcome of a successful scan submission.
///
/// Constructed only when the service returned a success status with a usable
/// body, so holding one means the scan finished end to end.
#[derive(Debug, Clone)]
pub struct ScanVerdict {
    pub scan_id: ScanId,
    pub results: Vec<Finding>,
    pub report_url: Option<String>,
    pub timestamp: Option<String>,
    pub target_url: Option<String>,
}

/// Scan service operations the coordinator depends on.
#[async_trait]
pub trait ScanApi: Send + Sync {
    /// Submit a scan and wait for its final verdict. This call spans the
    /// whole server-side pipeline run.
    async fn start_scan(&self, request: ScanRequest) -> Result<ScanVerdict>;

    /// Fetch a previously stored scan by id.
    async fn fetch_scan(&self, id: ScanId) -> Result<ScanResponse>;

    /// List stored scans, newest first as the service returns them.
    async fn list_scans(&self) -> Result<Vec<ScanListEntry>>;

    /// Download the rendered PDF report for a scan.
    async fn download_report(&self, id: ScanId) -> Result<Vec<u8>>;
}

/// Reqwest-backed [`ScanApi`] implementation.
#[derive(Clone)]
pub struct ScanClient {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for ScanClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ScanClient {
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Resolve the bearer token before touching the network. A missing
    /// credential short-circuits the request entirely.
    async fn bearer(&self) -> Result<String> {
        self.credentials
            .bearer_token()
            .await
            .ok_or(ScanError::AuthRequired)
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ScanError::AuthRequired);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ScanError::RequestFailed {
                detail: detail_from_body(&text, status),
            });
        }
        Ok(response)
    }
}

/// Extract the service's own error text from a failure body.
///
/// The service reports failures as `{"detail": "..."}`; that text is shown to
/// the user verbatim. Anything else falls back to the raw body, then to a
/// generic status line.
fn detail_from_body(text: &str, status: StatusCode) -> String {
    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(body) if !body.detail.is_empty() => return body.detail,
        Ok(_) => {}
        Err(_) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    format!("scan request failed (HTTP {status})")
}

#[async_trait]
impl ScanApi for ScanClient {
    async fn start_scan(&self, request: ScanRequest) -> Result<ScanVerdict> {
        let token = self.bearer().await?;
        let url = self.endpoint("scan");

        debug!(target_id = %request.target_id, "submitting scan request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: ScanResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "scan verdict body did not decode");
                return Err(ScanError::MalformedResponse);
            }
        };

        let Some(scan_id) = body.scan_id else {
            warn!("scan verdict body is missing a scan id");
            return Err(ScanError::MalformedResponse);
        };

        debug!(%scan_id, findings = body.results.len(), "scan completed");

        Ok(ScanVerdict {
            scan_id,
            results: body.results,
            report_url: body.report_url,
            timestamp: body.timestamp,
            target_url: body.target_url,
        })
    }

    async fn fetch_scan(&self, id: ScanId) -> Result<ScanResponse> {
        let token = self.bearer().await?;
        let url = self.endpoint(&format!("scan/{id}"));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        response.json().await.map_err(|err| {
            warn!(error = %err, "stored scan body did not decode");
            ScanError::MalformedResponse
        })
    }

    async fn list_scans(&self) -> Result<Vec<ScanListEntry>> {
        let token = self.bearer().await?;
        let url = self.endpoint("scans");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        response.json().await.map_err(|err| {
            warn!(error = %err, "scan listing did not decode");
            ScanError::MalformedResponse
        })
    }

    async fn download_report(&self, id: ScanId) -> Result<Vec<u8>> {
        let token = self.bearer().await?;
        let url = self.endpoint(&format!("scan/{id}/report"));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
