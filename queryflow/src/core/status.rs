//! Workflow and per-stage status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The overall status of a workflow.
///
/// Transitions follow a fixed state machine: `Pending` → `Running` →
/// {`Completed`, `Failed`}, with a `Retrying` sub-loop entered when the
/// validation stage rejects a structurally valid query and retry budget
/// remains. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// The context has been created but the engine has not started.
    Pending,
    /// The engine is driving the pipeline.
    Running,
    /// Validation rejected the query; the retry sub-path is re-executing.
    Retrying,
    /// The workflow finished with a valid query.
    Completed,
    /// The workflow finished without a valid query.
    Failed,
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl WorkflowStatus {
    /// Returns true if the status is terminal.
    ///
    /// No transitions leave a terminal state; the engine writes the
    /// context once more to record it and then stops touching it.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the engine is actively executing stages.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Retrying)
    }
}

/// The derived status of a single stage, as seen by external pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The stage has not started.
    Pending,
    /// The stage is currently executing.
    Running,
    /// The stage finished successfully.
    Done,
    /// The workflow failed; the stage is reported failed.
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
