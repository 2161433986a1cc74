use std::fmt;

use thiserror::Error;

/// Errors produced by the scan request executor and coordinator surface.
#[derive(Error, Debug)]
pub enum ScanError {
    /// No usable bearer credential; the request was never sent.
    #[error("authentication required")]
    AuthRequired,

    /// The service rejected the request. The detail is the service's own
    /// text, surfaced verbatim.
    #[error("{detail}")]
    RequestFailed { detail: String },

    /// A success status arrived with a body this client cannot use.
    #[error("scan service returned an unusable response")]
    MalformedResponse,

    /// Transport-level failure talking to the service.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The coordinator task has shut down and no longer accepts commands.
    #[error("session coordinator stopped")]
    CoordinatorStopped,
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Cloneable failure stored in a failed session snapshot.
///
/// Render code branches on exactly two shapes: a missing/rejected credential
/// (login call-to-action) and everything else (error panel with the service's
/// text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    AuthRequired,
    Request { detail: String },
}

impl SessionFailure {
    pub fn request(detail: impl Into<String>) -> Self {
        SessionFailure::Request {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::AuthRequired => f.write_str("authentication required"),
            SessionFailure::Request { detail } => f.write_str(detail),
        }
    }
}

impl From<ScanError> for SessionFailure {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::AuthRequired => SessionFailure::AuthRequired,
            ScanError::RequestFailed { detail } => SessionFailure::Request { detail },
            ScanError::MalformedResponse => {
                SessionFailure::request(ScanError::MalformedResponse.to_string())
            }
            other => SessionFailure::request(other.to_string()),
        }
    }
}
