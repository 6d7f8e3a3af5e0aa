//! The stage contract and the built-in pipeline stages.
//!
//! Stages are pure transformations over the workflow context: each takes
//! the context by value and returns the updated context or a failure.
//! Synchronous and suspending stage bodies share the one async contract,
//! so the engine never branches on calling convention.

use crate::context::{ContextSlot, WorkflowContext};
use crate::errors::WorkflowError;
use crate::registry::StageId;
use async_trait::async_trait;
use std::fmt::Debug;

mod composition;
mod mapping;
mod planning;
mod validation;

pub use composition::CompositionStage;
pub use mapping::MappingStage;
pub use planning::PlanningStage;
pub use validation::ValidationStage;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the stage identifier.
    fn id(&self) -> StageId;

    /// Returns the context slots that must be populated before the stage
    /// may run.
    fn requires(&self) -> &[ContextSlot];

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The workflow context, taken by value
    ///
    /// # Returns
    ///
    /// The updated context, or a failure that fails the workflow.
    async fn execute(&self, ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError>;
}
