//! Hand-rolled stage and store doubles that record calls and return
//! configurable results.

use super::fixtures::{
    canned_composition_output, canned_mapping_output, canned_planning_output,
};
use crate::context::{ContextSlot, ValidationOutput, WorkflowContext};
use crate::core::WorkflowStatus;
use crate::errors::{StageExecutionError, StorageError, WorkflowError};
use crate::persistence::{storage_key, ContextStore, InMemoryContextStore};
use crate::registry::StageId;
use crate::stages::Stage;
use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

/// The default pipeline requirement set for a stage: the output slot of
/// its predecessor.
#[must_use]
pub fn default_requires(id: StageId) -> Vec<ContextSlot> {
    match id {
        StageId::Planning => vec![],
        StageId::Mapping => vec![ContextSlot::Planning],
        StageId::Composition => vec![ContextSlot::Mapping],
        StageId::Validation => vec![ContextSlot::Composition],
    }
}

/// A stage that passes the context through untouched.
#[derive(Debug)]
pub struct NoOpStage {
    id: StageId,
    requires: Vec<ContextSlot>,
}

impl NoOpStage {
    /// Creates a no-op stage with an empty requirement set.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            requires: Vec::new(),
        }
    }

    /// Overrides the declared requirements.
    #[must_use]
    pub fn with_requires(mut self, requires: Vec<ContextSlot>) -> Self {
        self.requires = requires;
        self
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn id(&self) -> StageId {
        self.id
    }

    fn requires(&self) -> &[ContextSlot] {
        &self.requires
    }

    async fn execute(&self, ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        Ok(ctx)
    }
}

/// A stage that fills its output slot with a canned record and counts
/// its invocations.
#[derive(Debug)]
pub struct CannedStage {
    id: StageId,
    requires: Vec<ContextSlot>,
    calls: Mutex<usize>,
}

impl CannedStage {
    /// Creates a canned stage with the default pipeline requirements.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            requires: default_requires(id),
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of times the stage was executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for CannedStage {
    fn id(&self) -> StageId {
        self.id
    }

    fn requires(&self) -> &[ContextSlot] {
        &self.requires
    }

    async fn execute(&self, mut ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        *self.calls.lock() += 1;

        match self.id {
            StageId::Planning => ctx.planning_output = Some(canned_planning_output()),
            StageId::Mapping => ctx.mapping_output = Some(canned_mapping_output()),
            StageId::Composition => ctx.composition_output = Some(canned_composition_output()),
            StageId::Validation => {
                ctx.validation_output = Some(ValidationOutput::valid("canned acceptance"));
            }
        }
        Ok(ctx)
    }
}

/// A stage that always fails with a stage execution error.
#[derive(Debug)]
pub struct FailingStage {
    id: StageId,
    requires: Vec<ContextSlot>,
    message: String,
}

impl FailingStage {
    /// Creates a failing stage with the default pipeline requirements.
    #[must_use]
    pub fn new(id: StageId, message: impl Into<String>) -> Self {
        Self {
            id,
            requires: default_requires(id),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> StageId {
        self.id
    }

    fn requires(&self) -> &[ContextSlot] {
        &self.requires
    }

    async fn execute(&self, _ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        Err(StageExecutionError::new(self.id.as_str(), self.message.clone()).into())
    }
}

/// A validation stage that rejects the first `reject_count` invocations
/// and accepts afterwards.
#[derive(Debug)]
pub struct ScriptedValidationStage {
    requires: Vec<ContextSlot>,
    reject_count: usize,
    calls: Mutex<usize>,
}

impl ScriptedValidationStage {
    /// Creates a validation double rejecting the first `reject_count`
    /// passes.
    #[must_use]
    pub fn new(reject_count: usize) -> Self {
        Self {
            requires: default_requires(StageId::Validation),
            reject_count,
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of times the stage was executed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for ScriptedValidationStage {
    fn id(&self) -> StageId {
        StageId::Validation
    }

    fn requires(&self) -> &[ContextSlot] {
        &self.requires
    }

    async fn execute(&self, mut ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        let call_index = {
            let mut calls = self.calls.lock();
            let index = *calls;
            *calls += 1;
            index
        };

        if call_index < self.reject_count {
            let feedback = "Suggestion: Add WHERE clause to apply filters".to_string();
            ctx.feedback = Some(feedback.clone());
            ctx.validation_output = Some(ValidationOutput::invalid(
                vec!["Query should include WHERE clause for filters".to_string()],
                feedback,
            ));
        } else {
            ctx.validation_output = Some(ValidationOutput::valid("scripted acceptance"));
        }
        Ok(ctx)
    }
}

/// A store that delegates to an in-memory store and records the status
/// carried by every saved snapshot.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryContextStore,
    statuses: Mutex<Vec<WorkflowStatus>>,
}

impl RecordingStore {
    /// Creates a recording store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the statuses in save order.
    #[must_use]
    pub fn saved_statuses(&self) -> Vec<WorkflowStatus> {
        self.statuses.lock().clone()
    }
}

#[async_trait]
impl ContextStore for RecordingStore {
    async fn save(&self, ctx: &WorkflowContext) -> Result<(), StorageError> {
        self.statuses.lock().push(ctx.status);
        self.inner.save(ctx).await
    }

    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowContext>, StorageError> {
        self.inner.load(workflow_id).await
    }
}

/// A store that starts failing writes after a configurable number of
/// successful saves.
#[derive(Debug)]
pub struct FailingStore {
    inner: InMemoryContextStore,
    allow_saves: usize,
    saves: Mutex<usize>,
}

impl FailingStore {
    /// Creates a store that accepts `allow_saves` writes, then fails.
    #[must_use]
    pub fn new(allow_saves: usize) -> Self {
        Self {
            inner: InMemoryContextStore::new(),
            allow_saves,
            saves: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ContextStore for FailingStore {
    async fn save(&self, ctx: &WorkflowContext) -> Result<(), StorageError> {
        let attempt = {
            let mut saves = self.saves.lock();
            let index = *saves;
            *saves += 1;
            index
        };

        if attempt >= self.allow_saves {
            return Err(StorageError::write(
                storage_key(ctx.workflow_id),
                "simulated backend outage",
            ));
        }
        self.inner.save(ctx).await
    }

    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowContext>, StorageError> {
        self.inner.load(workflow_id).await
    }
}
