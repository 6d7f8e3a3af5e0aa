//! Context persistence: the store contract and the in-memory TTL store.
//!
//! One document is kept per workflow, under a namespaced key, with a
//! time-to-live refreshed on every write. After the TTL lapses the
//! snapshot is irretrievable and pollers see the workflow as unknown.

use crate::context::WorkflowContext;
use crate::errors::StorageError;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

mod memory;

pub use memory::InMemoryContextStore;

/// Namespace prefix for workflow snapshot keys.
pub const STORAGE_KEY_PREFIX: &str = "workflow";

/// Default snapshot time-to-live: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Derives the storage key for a workflow identifier.
#[must_use]
pub fn storage_key(workflow_id: Uuid) -> String {
    format!("{STORAGE_KEY_PREFIX}:{workflow_id}")
}

/// Trait for persisting workflow context snapshots.
///
/// The engine and the service receive the store as a constructor
/// argument, so test doubles can stand in for the real backend.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Persists the context snapshot, overwriting any prior snapshot for
    /// the same workflow and resetting its TTL.
    ///
    /// A write failure is reported, never swallowed: the engine treats it
    /// as fatal for the current step.
    async fn save(&self, ctx: &WorkflowContext) -> Result<(), StorageError>;

    /// Loads the snapshot for a workflow.
    ///
    /// Returns `Ok(None)` when the key is absent, expired, or the stored
    /// document no longer parses (the parse failure is logged); callers
    /// must treat all three as "workflow unknown", not as errors.
    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowContext>, StorageError>;
}
