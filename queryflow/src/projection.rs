//! Status projection: derive external polling views from a persisted
//! context.
//!
//! Projection is a pure function of the context, with no side effects;
//! pollers never block the engine.

use crate::context::WorkflowContext;
use crate::core::{StepStatus, WorkflowStatus};
use crate::registry::StageId;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The overall status view of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatusView {
    /// The workflow identifier.
    pub workflow_id: Uuid,
    /// Overall status.
    pub status: WorkflowStatus,
    /// The stage currently executing, or the last one executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageId>,
    /// Number of retry passes executed.
    pub retry_count: u32,
    /// Feedback text; for failed workflows this is the user-visible
    /// failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last-update time.
    pub updated_at: Timestamp,
}

/// The derived view of a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatusView {
    /// The stage.
    pub stage: StageId,
    /// The derived per-stage status.
    pub status: StepStatus,
    /// A summarized view of the stage's output, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<serde_json::Value>,
    /// When the stage started, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the stage finished, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

/// Projects the overall status view from a context.
#[must_use]
pub fn project_status(ctx: &WorkflowContext) -> WorkflowStatusView {
    WorkflowStatusView {
        workflow_id: ctx.workflow_id,
        status: ctx.status,
        current_stage: ctx.current_step,
        retry_count: ctx.retry_count,
        feedback: ctx.feedback.clone(),
        created_at: ctx.created_at,
        updated_at: ctx.updated_at,
    }
}

/// Projects the ordered per-stage views from a context.
#[must_use]
pub fn project_steps(ctx: &WorkflowContext) -> Vec<StageStatusView> {
    StageId::ordered()
        .into_iter()
        .map(|stage| {
            let status = step_status(stage, ctx.current_step, ctx.status);
            // Per-stage timings are not tracked; the workflow-level
            // timestamps stand in.
            let started_at = matches!(status, StepStatus::Running | StepStatus::Done)
                .then_some(ctx.created_at);
            let finished_at = matches!(status, StepStatus::Done).then_some(ctx.updated_at);

            StageStatusView {
                stage,
                status,
                output_summary: output_summary(ctx, stage),
                started_at,
                finished_at,
            }
        })
        .collect()
}

/// Derives a single stage's status from its position relative to the
/// current step and the overall status.
fn step_status(
    stage: StageId,
    current: Option<StageId>,
    overall: WorkflowStatus,
) -> StepStatus {
    if overall == WorkflowStatus::Failed {
        return StepStatus::Failed;
    }

    let Some(current) = current else {
        return StepStatus::Pending;
    };

    match stage.position().cmp(&current.position()) {
        std::cmp::Ordering::Less => StepStatus::Done,
        std::cmp::Ordering::Equal => {
            if overall.is_active() {
                StepStatus::Running
            } else if overall == WorkflowStatus::Completed {
                StepStatus::Done
            } else {
                StepStatus::Pending
            }
        }
        std::cmp::Ordering::Greater => StepStatus::Pending,
    }
}

/// Builds the summarized output view for one stage.
///
/// Summaries are reduced on purpose: element counts and result text
/// only, never the raw schema or caller metadata.
fn output_summary(ctx: &WorkflowContext, stage: StageId) -> Option<serde_json::Value> {
    match stage {
        StageId::Planning => ctx.planning_output.as_ref().map(|output| {
            serde_json::json!({
                "intent": output.intent,
                "entities": output.entities.len(),
                "filters": output.filters.len(),
                "aggregations": output.aggregations.len(),
            })
        }),
        StageId::Mapping => ctx.mapping_output.as_ref().map(|output| {
            serde_json::json!({
                "mapped_entities": output.mapped_entities.len(),
                "mapped_filters": output.mapped_filters.len(),
                "mapped_aggregations": output.mapped_aggregations.len(),
            })
        }),
        StageId::Composition => ctx.composition_output.as_ref().map(|output| {
            serde_json::json!({ "sql_query": output.sql_query })
        }),
        StageId::Validation => ctx.validation_output.as_ref().map(|output| {
            serde_json::json!({
                "is_valid": output.is_valid,
                "errors": output.errors.len(),
                "feedback": output.feedback,
            })
        }),
    }
}
