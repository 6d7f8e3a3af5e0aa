//! Error types for the queryflow engine.
//!
//! The taxonomy separates fatal errors (preconditions, stage execution,
//! storage, deserialization, registry configuration) from validation
//! failure, which is ordinary data carried in the workflow context and
//! drives the bounded retry loop instead of the error path.

use thiserror::Error;

/// The main error type for queryflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A stage's declared input was missing from the context.
    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    /// A stage function returned a failure.
    #[error("{0}")]
    StageExecution(#[from] StageExecutionError),

    /// A persistence read or write failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A persisted record did not parse back into a valid context.
    #[error("{0}")]
    Deserialization(#[from] DeserializationError),

    /// The stage registry is misconfigured.
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

/// Error raised when a stage's declared input is missing.
///
/// Fatal: the workflow is failed without retry.
#[derive(Debug, Clone, Error)]
#[error("Missing preconditions for stage '{stage}': [{}]", missing.join(", "))]
pub struct PreconditionError {
    /// The stage whose preconditions were unmet.
    pub stage: String,
    /// The names of the missing context fields.
    pub missing: Vec<String>,
}

impl PreconditionError {
    /// Creates a new precondition error.
    #[must_use]
    pub fn new(stage: impl Into<String>, missing: Vec<String>) -> Self {
        Self {
            stage: stage.into(),
            missing,
        }
    }
}

/// Error raised when a stage function fails.
///
/// Fatal for the current run of the pipeline: stage errors are never
/// retried automatically.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' failed: {message}")]
pub struct StageExecutionError {
    /// The failing stage.
    pub stage: String,
    /// The failure description.
    pub message: String,
}

impl StageExecutionError {
    /// Creates a new stage execution error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a persistence operation fails.
#[derive(Debug, Clone, Error)]
#[error("Storage {operation} failed for key '{key}': {message}")]
pub struct StorageError {
    /// The failed operation ("read" or "write").
    pub operation: String,
    /// The storage key involved.
    pub key: String,
    /// The failure description.
    pub message: String,
}

impl StorageError {
    /// Creates a write-side storage error.
    #[must_use]
    pub fn write(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: "write".to_string(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a read-side storage error.
    #[must_use]
    pub fn read(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: "read".to_string(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a persisted document does not parse back into a
/// valid workflow context.
#[derive(Debug, Clone, Error)]
#[error("Invalid context document{}: {message}", field.as_ref().map_or_else(String::new, |f| format!(" (field '{f}')")))]
pub struct DeserializationError {
    /// The offending field, when it could be identified.
    pub field: Option<String>,
    /// The parse failure description.
    pub message: String,
}

impl DeserializationError {
    /// Creates an error for a missing required field.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("missing required field '{field}'"),
            field: Some(field),
        }
    }

    /// Creates an error from a serde diagnostic.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Errors raised while assembling or consulting the stage registry.
///
/// All variants are configuration errors detected at startup, before any
/// workflow runs.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A stage of the fixed pipeline was not registered.
    #[error("Stage '{stage}' is not registered")]
    MissingStage {
        /// The missing stage.
        stage: String,
    },

    /// A stage was registered more than once.
    #[error("Stage '{stage}' is registered more than once")]
    DuplicateStage {
        /// The duplicated stage.
        stage: String,
    },

    /// A stage requires a field no earlier stage produces.
    #[error("Stage '{stage}' requires '{field}', which no earlier stage produces")]
    UnsatisfiableRequirement {
        /// The requiring stage.
        stage: String,
        /// The unsatisfiable field.
        field: String,
    },

    /// A stage identifier did not match any known stage.
    #[error("Unknown stage identifier: '{name}'")]
    UnknownStage {
        /// The unresolved identifier.
        name: String,
    },
}

impl RegistryError {
    /// Creates a missing stage error.
    #[must_use]
    pub fn missing_stage(stage: impl Into<String>) -> Self {
        Self::MissingStage { stage: stage.into() }
    }

    /// Creates a duplicate stage error.
    #[must_use]
    pub fn duplicate_stage(stage: impl Into<String>) -> Self {
        Self::DuplicateStage { stage: stage.into() }
    }

    /// Creates an unsatisfiable requirement error.
    #[must_use]
    pub fn unsatisfiable(stage: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnsatisfiableRequirement {
            stage: stage.into(),
            field: field.into(),
        }
    }

    /// Creates an unknown stage error.
    #[must_use]
    pub fn unknown_stage(name: impl Into<String>) -> Self {
        Self::UnknownStage { name: name.into() }
    }
}
