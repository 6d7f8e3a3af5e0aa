//! The execution engine: stage sequencing, precondition enforcement,
//! status transitions, and the bounded retry loop.
//!
//! Two failure modes are kept strictly apart: a stage error (or missing
//! precondition, or storage failure) is fatal and fails the workflow
//! immediately, while a structurally valid validation output whose
//! validity flag is false drives the bounded retry of the composition
//! sub-path. The terminal context is persisted on every exit path.

use crate::context::WorkflowContext;
use crate::core::WorkflowStatus;
use crate::errors::{PreconditionError, WorkflowError};
use crate::persistence::ContextStore;
use crate::registry::{StageId, StageRegistry};
use std::sync::Arc;

#[cfg(test)]
mod integration_tests;

/// Drives workflow contexts through the fixed pipeline.
///
/// The registry and the store are injected, so the engine can run
/// against test doubles.
pub struct ExecutionEngine {
    registry: Arc<StageRegistry>,
    store: Arc<dyn ContextStore>,
}

impl ExecutionEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry>, store: Arc<dyn ContextStore>) -> Self {
        Self { registry, store }
    }

    /// The sub-path re-executed on retry: re-derive the query text from
    /// the same mapping output, then re-validate.
    #[must_use]
    pub fn retry_path() -> [StageId; 2] {
        [StageId::Composition, StageId::Validation]
    }

    /// Returns true if a retry pass is warranted: the validation output
    /// is present, its validity flag is false, and budget remains.
    ///
    /// Only the validity flag gates retries; errors from earlier stages
    /// are never retried.
    #[must_use]
    pub fn should_retry(ctx: &WorkflowContext) -> bool {
        ctx.validation_output
            .as_ref()
            .is_some_and(|validation| !validation.is_valid)
            && ctx.retry_count < ctx.max_retries
    }

    /// Runs the workflow to a terminal state.
    ///
    /// Never returns an error: fatal errors are recorded into the
    /// context's feedback, the status becomes FAILED, and the terminal
    /// snapshot is written unconditionally.
    pub async fn run(&self, mut ctx: WorkflowContext) -> WorkflowContext {
        ctx.status = WorkflowStatus::Running;
        let outcome = match self.persist(&mut ctx).await {
            Ok(()) => self.drive(&mut ctx).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                let accepted = ctx
                    .validation_output
                    .as_ref()
                    .is_some_and(|validation| validation.is_valid);
                if accepted {
                    ctx.status = WorkflowStatus::Completed;
                    tracing::info!(workflow_id = %ctx.workflow_id, "workflow completed");
                } else {
                    ctx.status = WorkflowStatus::Failed;
                    tracing::info!(
                        workflow_id = %ctx.workflow_id,
                        retries = ctx.retry_count,
                        "workflow failed: validation never accepted the query"
                    );
                }
            }
            Err(err) => {
                ctx.status = WorkflowStatus::Failed;
                ctx.feedback = Some(err.to_string());
                tracing::error!(
                    workflow_id = %ctx.workflow_id,
                    error = %err,
                    "workflow execution aborted"
                );
            }
        }

        // The terminal snapshot is written on every exit path, including
        // after an aborting error; a failed terminal write can only be
        // logged at this point.
        ctx.touch();
        if let Err(err) = self.store.save(&ctx).await {
            tracing::error!(
                workflow_id = %ctx.workflow_id,
                error = %err,
                "failed to persist terminal context"
            );
        }

        ctx
    }

    /// Executes the main pass and the retry loop.
    async fn drive(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
        for stage_id in self.registry.ordered_stages() {
            self.run_stage(ctx, stage_id).await?;
        }

        while Self::should_retry(ctx) {
            ctx.retry_count += 1;
            ctx.status = WorkflowStatus::Retrying;
            self.persist(ctx).await?;
            tracing::info!(
                workflow_id = %ctx.workflow_id,
                attempt = ctx.retry_count,
                "validation rejected the query; re-running composition"
            );

            for stage_id in Self::retry_path() {
                self.run_stage(ctx, stage_id).await?;
            }
        }

        Ok(())
    }

    /// Checks preconditions, then executes one stage, persisting the
    /// context before and after the stage body runs.
    async fn run_stage(
        &self,
        ctx: &mut WorkflowContext,
        stage_id: StageId,
    ) -> Result<(), WorkflowError> {
        let stage = Arc::clone(self.registry.get(stage_id));

        let missing: Vec<String> = stage
            .requires()
            .iter()
            .filter(|slot| !ctx.slot_filled(**slot))
            .map(|slot| slot.field_name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PreconditionError::new(stage_id.as_str(), missing).into());
        }

        ctx.current_step = Some(stage_id);
        self.persist(ctx).await?;

        tracing::info!(workflow_id = %ctx.workflow_id, stage = %stage_id, "executing stage");
        *ctx = stage.execute(ctx.clone()).await?;
        self.persist(ctx).await?;

        Ok(())
    }

    /// Bumps the update timestamp and writes the snapshot.
    async fn persist(&self, ctx: &mut WorkflowContext) -> Result<(), WorkflowError> {
        ctx.touch();
        self.store.save(ctx).await?;
        Ok(())
    }
}
