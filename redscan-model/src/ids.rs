use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ModelError;

/// Strongly typed server-assigned scan identifier.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        ScanId(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for ScanId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ModelError::InvalidScanId(
                "scan ID cannot be empty".to_string(),
            ));
        }
        let uuid = s
            .parse()
            .map_err(|_| ModelError::InvalidScanId(format!("not a UUID: {s}")))?;
        Ok(ScanId(uuid))
    }
}

/// Identity of a progress channel connection.
///
/// A channel is opened before the server has assigned a scan ID, so the first
/// connection of every session runs under a locally generated provisional
/// token. Once the scan request returns, the channel is reopened under the
/// assigned [`ScanId`] and events tagged with the old token no longer apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelToken {
    /// Locally generated placeholder used until the server assigns an ID.
    Provisional(Uuid),
    /// Token derived from the server-assigned scan ID.
    Assigned(ScanId),
}

impl ChannelToken {
    pub fn provisional() -> Self {
        ChannelToken::Provisional(Uuid::new_v4())
    }

    pub const fn is_provisional(&self) -> bool {
        matches!(self, ChannelToken::Provisional(_))
    }
}

impl From<ScanId> for ChannelToken {
    fn from(id: ScanId) -> Self {
        ChannelToken::Assigned(id)
    }
}

/// Renders the path segment used in the channel endpoint URL.
impl fmt::Display for ChannelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelToken::Provisional(uuid) => write!(f, "{uuid}"),
            ChannelToken::Assigned(id) => write!(f, "{id}"),
        }
    }
}
