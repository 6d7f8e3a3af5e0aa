//! The caller-facing service surface: submission and polling.
//!
//! Submission is decoupled from execution: the pending context is
//! durably persisted before `submit` returns, and the pipeline run is
//! detached as a background task keyed by the workflow id. The submit
//! path never awaits the run; completion is observed only through the
//! persisted context.

use crate::context::{SchemaDescriptor, WorkflowContext, DEFAULT_MAX_RETRIES};
use crate::engine::ExecutionEngine;
use crate::errors::WorkflowError;
use crate::persistence::ContextStore;
use crate::projection::{project_status, project_steps, StageStatusView, WorkflowStatusView};
use crate::registry::StageRegistry;
use std::sync::Arc;
use uuid::Uuid;

/// Submits workflows and serves status polls.
pub struct WorkflowService {
    engine: Arc<ExecutionEngine>,
    store: Arc<dyn ContextStore>,
    max_retries: u32,
}

impl WorkflowService {
    /// Creates a service over the given registry and store.
    #[must_use]
    pub fn new(registry: Arc<StageRegistry>, store: Arc<dyn ContextStore>) -> Self {
        Self {
            engine: Arc::new(ExecutionEngine::new(registry, store.clone())),
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the retry ceiling applied to submitted workflows.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Starts a workflow and returns its identifier immediately after
    /// the pending context is durably persisted.
    pub async fn submit(
        &self,
        query: impl Into<String>,
        schema: SchemaDescriptor,
        user_id: Option<String>,
    ) -> Result<Uuid, WorkflowError> {
        let mut ctx =
            WorkflowContext::new(query, schema).with_max_retries(self.max_retries);
        if let Some(user_id) = user_id {
            ctx = ctx.with_user_id(user_id);
        }

        let workflow_id = ctx.workflow_id;
        self.store.save(&ctx).await?;

        tracing::info!(workflow_id = %workflow_id, "workflow submitted");

        // Detached, cancellation-unaware background run. The task owns
        // the context; its result surfaces only via the store.
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.run(ctx).await;
        });

        Ok(workflow_id)
    }

    /// Returns the overall status view, or `None` for an unknown or
    /// expired workflow.
    pub async fn get_status(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowStatusView>, WorkflowError> {
        let ctx = self.store.load(workflow_id).await?;
        Ok(ctx.as_ref().map(project_status))
    }

    /// Returns the ordered per-stage views, or `None` for an unknown or
    /// expired workflow.
    pub async fn get_steps(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Vec<StageStatusView>>, WorkflowError> {
        let ctx = self.store.load(workflow_id).await?;
        Ok(ctx.as_ref().map(project_steps))
    }
}
