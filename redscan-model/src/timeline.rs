use crate::stage::{Stage, StageState};

/// Pure state container for the four-stage pipeline timeline.
///
/// The timeline never talks to the network; the session coordinator feeds it
/// interpreted progress events and reads it back out for display. Duplicate
/// events are absorbed (`set_stage` reports whether anything changed) and a
/// stage that has reached [`StageState::Done`] or [`StageState::Error`] will
/// not move back to [`StageState::Waiting`] except through [`Timeline::reset`].
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    states: [StageState; 4],
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, stage: Stage) -> StageState {
        self.states[stage.index()]
    }

    /// Applies a state to one stage, returning whether the timeline changed.
    ///
    /// Late or duplicated events make this a no-op: setting the current state
    /// again changes nothing, and a terminal stage rejects a move back to
    /// [`StageState::Waiting`].
    pub fn set_stage(&mut self, stage: Stage, state: StageState) -> bool {
        let slot = &mut self.states[stage.index()];
        if *slot == state {
            return false;
        }
        if slot.is_terminal() && state == StageState::Waiting {
            return false;
        }
        *slot = state;
        true
    }

    /// Clears every stage back to [`StageState::Waiting`] for a new session.
    pub fn reset(&mut self) {
        self.states = [StageState::Waiting; 4];
    }

    pub fn all_done(&self) -> bool {
        self.states.iter().all(|s| *s == StageState::Done)
    }

    /// First stage currently running, in pipeline order.
    pub fn active_stage(&self) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.state_of(*stage) == StageState::Running)
    }

    /// Marks every non-errored stage done, returning whether anything changed.
    ///
    /// Used when the scan request resolves successfully while the progress
    /// channel is still mid-stream: the verdict outranks whatever the stream
    /// got around to reporting.
    pub fn complete_remaining(&mut self) -> bool {
        let mut changed = false;
        for state in &mut self.states {
            if !matches!(*state, StageState::Done | StageState::Error) {
                *state = StageState::Done;
                changed = true;
            }
        }
        changed
    }

    /// Marks the active stage errored, returning which stage was marked.
    pub fn fail_active(&mut self) -> Option<Stage> {
        let stage = self.active_stage()?;
        self.set_stage(stage, StageState::Error);
        Some(stage)
    }

    /// Stage states in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, StageState)> + '_ {
        Stage::ALL.into_iter().map(|stage| (stage, self.state_of(stage)))
    }
}
