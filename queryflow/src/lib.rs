//! # Queryflow
//!
//! A workflow orchestration engine that turns a natural-language request
//! into a validated, executable query through a fixed four-stage pipeline.
//!
//! Queryflow provides:
//!
//! - **Stage-based execution**: a fixed pipeline of planning, mapping,
//!   composition and validation stages with declared preconditions
//! - **Context management**: a serializable workflow context persisted
//!   after every mutation
//! - **Bounded retry**: a feedback loop that re-derives and re-validates
//!   the query when validation rejects it, up to a retry ceiling
//! - **Status projection**: per-stage and overall status views for
//!   external polling, decoupled from the running engine
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use queryflow::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(StageRegistry::with_default_stages()?);
//! let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
//! let service = WorkflowService::new(registry, store);
//!
//! let id = service.submit("count all active users", schema, None).await?;
//! let status = service.get_status(id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod core;
pub mod engine;
pub mod errors;
pub mod persistence;
pub mod projection;
pub mod registry;
pub mod service;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{
        Aggregation, CompositionOutput, ContextSlot, Entity, FilterCondition,
        MappingOutput, PlanningOutput, SchemaDescriptor, TableDescriptor,
        ValidationOutput, WorkflowContext,
    };
    pub use crate::core::{StepStatus, WorkflowStatus};
    pub use crate::engine::ExecutionEngine;
    pub use crate::errors::{
        DeserializationError, PreconditionError, RegistryError,
        StageExecutionError, StorageError, WorkflowError,
    };
    pub use crate::persistence::{ContextStore, InMemoryContextStore};
    pub use crate::projection::{
        project_status, project_steps, StageStatusView, WorkflowStatusView,
    };
    pub use crate::registry::{StageId, StageRegistry};
    pub use crate::service::WorkflowService;
    pub use crate::stages::Stage;
    pub use crate::utils::{iso_timestamp, now_utc, Timestamp};
}
