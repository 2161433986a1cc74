use crate::stage::{Stage, StageCatalog, StageState};

/// Sentinel progress value: the named agent has just started.
pub const PROGRESS_STARTED: i64 = -1;
/// Sentinel progress value: the named agent has completed its stage.
pub const PROGRESS_COMPLETED: i64 = -2;

/// One inbound frame from the progress channel.
///
/// Every field is optional on the wire. The pipeline emits
/// `{agent, progress, details}` updates, `{agent, progress: -1, error}`
/// error notices and a bare `{done: true}` terminator, and the endpoint
/// echoes unrelated service frames (for example `{"status": "connected"}`)
/// that deserialize to an empty event and carry no meaning here.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub done: bool,
}

impl ProgressEvent {
    /// Displayable progress percentage, if this frame carries one.
    ///
    /// Sentinel and out-of-range values yield `None`; they mark stage
    /// boundaries, not bar positions.
    pub fn percent(&self) -> Option<u8> {
        self.progress
            .filter(|p| (0..=100).contains(p))
            .map(|p| p as u8)
    }

    pub fn is_stage_complete(&self) -> bool {
        self.progress == Some(PROGRESS_COMPLETED)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Interprets this frame as a timeline transition.
    ///
    /// `None` when the frame names no agent or an agent the catalog does not
    /// know (the pipeline's error frames use the pseudo-agent `"Error"`,
    /// which no catalog maps). A completed sentinel moves the stage to
    /// [`StageState::Done`]; anything else means the stage is underway.
    pub fn stage_transition(&self, catalog: &StageCatalog) -> Option<(Stage, StageState)> {
        let agent = self.agent.as_deref()?;
        let stage = catalog.stage_for(agent)?;
        let state = if self.is_stage_complete() {
            StageState::Done
        } else {
            StageState::Running
        };
        Some((stage, state))
    }
}
