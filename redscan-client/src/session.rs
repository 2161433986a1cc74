//! Pure per-session scan state.
//!
//! [`ScanSession`] is the snapshot the coordinator publishes to observers:
//! no I/O, no tasks, just the lifecycle status, the stage timeline, and the
//! latest progress detail. All mutation goes through the methods here so the
//! guards (stale tokens, terminal states, write-once ids) live in one place.

use chrono::{DateTime, Utc};
use tracing::debug;

use redscan_model::{
    finding::Finding,
    ids::{ChannelToken, ScanId},
    progress::ProgressEvent,
    session::SessionStatus,
    stage::{Stage, StageCatalog, StageState},
    timeline::Timeline,
};

use crate::error::SessionFailure;

/// Snapshot of one scan attempt.
///
/// `generation` increments every time a new attempt begins; anything produced
/// on behalf of an older generation (a late verdict, a grace timer) carries
/// its generation along and is discarded on mismatch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanSession {
    pub generation: u64,
    pub channel_token: Option<ChannelToken>,
    pub scan_id: Option<ScanId>,
    pub status: SessionStatus,
    pub timeline: Timeline,
    pub percent: Option<u8>,
    pub detail: Option<String>,
    pub target: Option<String>,
    pub results: Vec<Finding>,
    pub failure: Option<SessionFailure>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ScanSession {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Begin a new attempt, superseding whatever this session held before.
    ///
    /// Returns the provisional channel token the progress connection should
    /// be opened under.
    pub fn begin(&mut self, target: impl Into<String>) -> ChannelToken {
        let token = ChannelToken::provisional();
        self.generation += 1;
        self.channel_token = Some(token);
        self.scan_id = None;
        self.status = SessionStatus::Starting;
        self.timeline.reset();
        self.timeline.set_stage(Stage::Profiling, StageState::Running);
        self.percent = None;
        self.detail = None;
        self.target = Some(target.into());
        self.results.clear();
        self.failure = None;
        self.started_at = Some(Utc::now());
        token
    }

    /// Fold one progress event into the session, returning whether anything
    /// observable changed.
    ///
    /// Events tagged with a token other than the current one belong to a
    /// superseded connection and are dropped. Percent is last-write-wins;
    /// the pipeline legitimately reports regressions when a new agent takes
    /// over. The first event that carries any content moves a `Starting`
    /// session to `Running`.
    pub fn apply_progress(
        &mut self,
        token: ChannelToken,
        event: &ProgressEvent,
        catalog: &StageCatalog,
    ) -> bool {
        if self.channel_token != Some(token) {
            debug!(%token, "dropping progress from a superseded channel");
            return false;
        }
        if !self.status.is_active() {
            return false;
        }

        let transition = event.stage_transition(catalog);
        let applicable = transition.is_some()
            || event.percent().is_some()
            || event.details.is_some()
            || event.error.is_some()
            || event.done;
        if !applicable {
            // Service echoes like `{"status": "connected"}` land here.
            return false;
        }

        let mut changed = false;

        if let Some((stage, state)) = transition {
            changed |= self.timeline.set_stage(stage, state);
        }
        if event.done {
            changed |= self.timeline.complete_remaining();
        }
        if let Some(percent) = event.percent()
            && self.percent != Some(percent)
        {
            self.percent = Some(percent);
            changed = true;
        }
        if let Some(details) = &event.details
            && self.detail.as_deref() != Some(details.as_str())
        {
            self.detail = Some(details.clone());
            changed = true;
        }
        if let Some(error) = &event.error
            && self.detail.as_deref() != Some(error.as_str())
        {
            // Stream-reported agent trouble is display material; only the
            // request outcome decides how the session ends.
            self.detail = Some(error.clone());
            changed = true;
        }

        if self.status == SessionStatus::Starting {
            self.status = SessionStatus::Running;
            changed = true;
        }

        changed
    }

    /// Record the server-assigned scan id. Write-once per attempt.
    ///
    /// Also retags the channel: from here on only events under the assigned
    /// token apply.
    pub fn assign_scan_id(&mut self, id: ScanId) -> bool {
        if self.scan_id.is_some() {
            debug!(%id, "scan id already assigned for this attempt");
            return false;
        }
        self.scan_id = Some(id);
        self.channel_token = Some(ChannelToken::from(id));
        true
    }

    /// Resolve the session as succeeded with the scan's findings.
    ///
    /// The verdict outranks the stream: every stage still pending is marked
    /// done and the bar snaps to 100.
    pub fn succeed(&mut self, results: Vec<Finding>) {
        self.status = SessionStatus::Succeeded;
        self.results = results;
        self.failure = None;
        self.timeline.complete_remaining();
        self.percent = Some(100);
    }

    /// Resolve the session as failed, marking every running stage errored.
    /// Returns the first stage that was marked, if any was running.
    pub fn fail(&mut self, failure: SessionFailure) -> Option<Stage> {
        self.status = SessionStatus::Failed;
        self.failure = Some(failure);
        let first = self.timeline.fail_active();
        while self.timeline.fail_active().is_some() {}
        first
    }

    /// Cancel a pending attempt. Only `Starting` and `Running` sessions can
    /// be cancelled; anything else reports `false` and stays put.
    pub fn cancel(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.status = SessionStatus::Cancelled;
        true
    }
}
