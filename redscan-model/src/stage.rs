use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// The four fixed stages of the scan pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Profiling,
    Strategy,
    Execution,
    Analysis,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::Profiling,
        Stage::Strategy,
        Stage::Execution,
        Stage::Analysis,
    ];

    /// Human-readable stage name shown in the timeline.
    pub const fn display_name(self) -> &'static str {
        match self {
            Stage::Profiling => "Target Profiling",
            Stage::Strategy => "Attack Strategy",
            Stage::Execution => "Attack Execution",
            Stage::Analysis => "Analysis & XAI",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Stage::Profiling => 0,
            Stage::Strategy => 1,
            Stage::Execution => 2,
            Stage::Analysis => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Stage {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profiling" => Ok(Stage::Profiling),
            "strategy" => Ok(Stage::Strategy),
            "execution" => Ok(Stage::Execution),
            "analysis" => Ok(Stage::Analysis),
            other => Err(ModelError::InvalidStage(other.to_string())),
        }
    }
}

/// Display state of a single timeline stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    #[default]
    Waiting,
    Running,
    Done,
    Error,
}

impl StageState {
    /// Terminal states never revert to [`StageState::Waiting`].
    pub const fn is_terminal(self) -> bool {
        matches!(self, StageState::Done | StageState::Error)
    }
}

/// Maps agent labels from progress events onto timeline stages.
///
/// Upstream pipelines have never agreed on one label per agent; the default
/// catalog carries every form observed on the wire. Unknown labels resolve to
/// `None` and the caller drops the event.
#[derive(Debug, Clone, Default)]
pub struct StageCatalog {
    overrides: HashMap<String, Stage>,
}

impl StageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extra label form on top of the built-in ones.
    pub fn with_label(mut self, label: impl Into<String>, stage: Stage) -> Self {
        self.overrides.insert(label.into(), stage);
        self
    }

    pub fn stage_for(&self, agent: &str) -> Option<Stage> {
        if let Some(stage) = self.overrides.get(agent) {
            return Some(*stage);
        }
        builtin_stage(agent)
    }
}

fn builtin_stage(agent: &str) -> Option<Stage> {
    match agent {
        "Target Profiling" | "Profiling" => Some(Stage::Profiling),
        "Attack Strategy" | "Strategy" => Some(Stage::Strategy),
        "Attack Execution" | "Execution" => Some(Stage::Execution),
        "Analysis & XAI" | "Observer" => Some(Stage::Analysis),
        _ => None,
    }
}
