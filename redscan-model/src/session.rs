use std::fmt;

/// Lifecycle of one scan session as tracked by the coordinator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No scan has run yet (or the last one was fully torn down).
    #[default]
    Idle,
    /// The scan request is in flight and no progress has arrived.
    Starting,
    /// Progress events are being applied.
    Running,
    /// The scan request resolved with results.
    Succeeded,
    /// The scan request resolved with an error.
    Failed,
    /// The user abandoned the session before a verdict arrived.
    Cancelled,
}

impl SessionStatus {
    /// Terminal states never transition again within the same generation.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Succeeded | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }

    /// A session that has started and not yet reached a terminal state.
    pub const fn is_active(self) -> bool {
        matches!(self, SessionStatus::Starting | SessionStatus::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Starting => "starting",
            SessionStatus::Running => "running",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
