//! Core data model definitions shared across Redscan crates.
#![allow(missing_docs)]

pub mod error;
pub mod finding;
pub mod ids;
pub mod progress;
pub mod scan;
pub mod session;
pub mod stage;
pub mod timeline;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use finding::{Classification, Finding, Severity};
pub use ids::{ChannelToken, ScanId};
pub use progress::{PROGRESS_COMPLETED, PROGRESS_STARTED, ProgressEvent};
pub use scan::{ApiErrorBody, ScanListEntry, ScanRequest, ScanResponse, TargetType};
pub use session::SessionStatus;
pub use stage::{Stage, StageCatalog, StageState};
pub use timeline::Timeline;
