//! Workflow context management.
//!
//! This module provides:
//! - The shared, persisted context record for one workflow
//! - Typed per-stage output records
//! - The schema description supplied at submission

#[cfg(test)]
mod context_tests;
mod inputs;
mod outputs;
mod workflow;

pub use inputs::{SchemaDescriptor, TableDescriptor};
pub use outputs::{
    AggregateFunction, Aggregation, CompositionOutput, Entity, EntityKind, FilterCondition,
    MappedAggregation, MappedEntity, MappedFilter, MappingOutput, PlanningOutput, QueryIntent,
    ValidationOutput,
};
pub use workflow::{ContextSlot, WorkflowContext, DEFAULT_MAX_RETRIES};
