//! The shared workflow context: inputs, per-stage outputs, and control
//! metadata for one end-to-end run.

use super::inputs::SchemaDescriptor;
use super::outputs::{CompositionOutput, MappingOutput, PlanningOutput, ValidationOutput};
use crate::core::WorkflowStatus;
use crate::errors::DeserializationError;
use crate::registry::StageId;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default retry ceiling for a workflow.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Top-level fields a persisted context document must carry.
const REQUIRED_FIELDS: &[&str] = &[
    "workflow_id",
    "query",
    "schema",
    "status",
    "retry_count",
    "max_retries",
    "created_at",
    "updated_at",
];

/// Names one of the four per-stage output slots on a context.
///
/// Stages declare their preconditions in terms of these slots; the
/// registry validates the declarations at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSlot {
    /// `planning_output`
    Planning,
    /// `mapping_output`
    Mapping,
    /// `composition_output`
    Composition,
    /// `validation_output`
    Validation,
}

impl ContextSlot {
    /// Returns the context field name for the slot.
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Planning => "planning_output",
            Self::Mapping => "mapping_output",
            Self::Composition => "composition_output",
            Self::Validation => "validation_output",
        }
    }
}

impl fmt::Display for ContextSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// The versioned, serializable record of one workflow's inputs,
/// intermediate outputs, and control metadata.
///
/// The context is created once per request, mutated by the engine as
/// stages execute, persisted after every mutation, and becomes immutable
/// once the status reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Globally unique workflow identifier; never reused or mutated.
    pub workflow_id: Uuid,
    /// The original natural-language query.
    pub query: String,
    /// The target schema description.
    pub schema: SchemaDescriptor,

    /// Planning stage output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_output: Option<PlanningOutput>,
    /// Mapping stage output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_output: Option<MappingOutput>,
    /// Composition stage output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_output: Option<CompositionOutput>,
    /// Validation stage output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_output: Option<ValidationOutput>,

    /// Overall workflow status.
    pub status: WorkflowStatus,
    /// The stage currently executing, or the last one executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StageId>,
    /// Free-text feedback driving retries and failure reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Number of retry passes executed so far.
    pub retry_count: u32,
    /// The fixed retry ceiling.
    pub max_retries: u32,

    /// Creation time; immutable.
    pub created_at: Timestamp,
    /// Last-update time; bumped on every persisted mutation.
    pub updated_at: Timestamp,

    /// Optional caller-supplied user identifier, carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Optional caller-supplied session identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl WorkflowContext {
    /// Creates a new pending context for the given query and schema.
    #[must_use]
    pub fn new(query: impl Into<String>, schema: SchemaDescriptor) -> Self {
        let now = now_utc();
        Self {
            workflow_id: Uuid::new_v4(),
            query: query.into(),
            schema,
            planning_output: None,
            mapping_output: None,
            composition_output: None,
            validation_output: None,
            status: WorkflowStatus::Pending,
            current_step: None,
            feedback: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at: now,
            updated_at: now,
            user_id: None,
            session_id: None,
        }
    }

    /// Sets the user identifier.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the retry ceiling.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bumps the last-update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = now_utc();
    }

    /// Returns true if the given output slot has been populated.
    #[must_use]
    pub fn slot_filled(&self, slot: ContextSlot) -> bool {
        match slot {
            ContextSlot::Planning => self.planning_output.is_some(),
            ContextSlot::Mapping => self.mapping_output.is_some(),
            ContextSlot::Composition => self.composition_output.is_some(),
            ContextSlot::Validation => self.validation_output.is_some(),
        }
    }

    /// Converts the context to a flat JSON document for persistence.
    #[must_use]
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Reconstructs a context from a persisted document.
    ///
    /// Required fields are checked explicitly so the error names the
    /// offending field; malformed nested values surface the serde
    /// diagnostic.
    pub fn from_document(document: serde_json::Value) -> Result<Self, DeserializationError> {
        let map = document
            .as_object()
            .ok_or_else(|| DeserializationError::invalid("document is not a JSON object"))?;

        for field in REQUIRED_FIELDS {
            if !map.contains_key(*field) {
                return Err(DeserializationError::missing_field(*field));
            }
        }

        serde_json::from_value(document)
            .map_err(|err| DeserializationError::invalid(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_slot_field_names() {
        assert_eq!(ContextSlot::Planning.field_name(), "planning_output");
        assert_eq!(ContextSlot::Validation.to_string(), "validation_output");
    }

    #[test]
    fn test_new_context_defaults() {
        let ctx = WorkflowContext::new("count all users", SchemaDescriptor::new());

        assert_eq!(ctx.status, WorkflowStatus::Pending);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(ctx.max_retries, DEFAULT_MAX_RETRIES);
        assert!(ctx.current_step.is_none());
        assert!(ctx.planning_output.is_none());
        assert_eq!(ctx.created_at, ctx.updated_at);
    }

    #[test]
    fn test_touch_bumps_updated_at() {
        let mut ctx = WorkflowContext::new("q", SchemaDescriptor::new());
        let before = ctx.updated_at;
        ctx.touch();
        assert!(ctx.updated_at >= before);
        assert!(ctx.updated_at >= ctx.created_at);
    }

    #[test]
    fn test_builder_metadata() {
        let ctx = WorkflowContext::new("q", SchemaDescriptor::new())
            .with_user_id("user-7")
            .with_session_id("session-1")
            .with_max_retries(5);

        assert_eq!(ctx.user_id.as_deref(), Some("user-7"));
        assert_eq!(ctx.session_id.as_deref(), Some("session-1"));
        assert_eq!(ctx.max_retries, 5);
    }
}
