//! The static stage registry: the fixed pipeline order, per-stage
//! precondition declarations, and typed stage lookup.
//!
//! Stages are resolved at startup into typed references; unknown
//! identifiers are configuration errors, not runtime lookup failures.

use crate::context::ContextSlot;
use crate::errors::RegistryError;
use crate::stages::{CompositionStage, MappingStage, PlanningStage, Stage, ValidationStage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifies one of the four fixed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Parse the natural-language request into a structured plan.
    Planning,
    /// Resolve the plan against the schema.
    Mapping,
    /// Compose the query text.
    Composition,
    /// Validate the composed query.
    Validation,
}

impl StageId {
    /// The fixed, total execution order of the pipeline.
    #[must_use]
    pub fn ordered() -> [Self; 4] {
        [Self::Planning, Self::Mapping, Self::Composition, Self::Validation]
    }

    /// Returns the stage's position in the fixed order.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Planning => 0,
            Self::Mapping => 1,
            Self::Composition => 2,
            Self::Validation => 3,
        }
    }

    /// Returns the context slot this stage populates.
    #[must_use]
    pub fn output_slot(&self) -> ContextSlot {
        match self {
            Self::Planning => ContextSlot::Planning,
            Self::Mapping => ContextSlot::Mapping,
            Self::Composition => ContextSlot::Composition,
            Self::Validation => ContextSlot::Validation,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Mapping => "mapping",
            Self::Composition => "composition",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StageId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "mapping" => Ok(Self::Mapping),
            "composition" => Ok(Self::Composition),
            "validation" => Ok(Self::Validation),
            other => Err(RegistryError::unknown_stage(other)),
        }
    }
}

/// A validated catalog of the four pipeline stages.
///
/// The registry does not execute anything; the engine consults it for
/// order, preconditions, and stage references.
pub struct StageRegistry {
    stages: [Arc<dyn Stage>; 4],
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &StageId::ordered())
            .finish()
    }
}

impl StageRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::new()
    }

    /// Builds a registry wired with the built-in stages.
    pub fn with_default_stages() -> Result<Self, RegistryError> {
        Self::builder()
            .register(Arc::new(PlanningStage::new()))
            .register(Arc::new(MappingStage::new()))
            .register(Arc::new(CompositionStage::new()))
            .register(Arc::new(ValidationStage::new()))
            .build()
    }

    /// Returns the fixed execution order.
    #[must_use]
    pub fn ordered_stages(&self) -> [StageId; 4] {
        StageId::ordered()
    }

    /// Returns the stage registered for the given identifier.
    #[must_use]
    pub fn get(&self, id: StageId) -> &Arc<dyn Stage> {
        &self.stages[id.position()]
    }

    /// Returns the context slots the given stage requires.
    #[must_use]
    pub fn requirements_of(&self, id: StageId) -> &[ContextSlot] {
        self.get(id).requires()
    }
}

/// Builder assembling and validating a [`StageRegistry`].
#[derive(Default)]
pub struct StageRegistryBuilder {
    registered: Vec<Arc<dyn Stage>>,
}

impl StageRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage.
    #[must_use]
    pub fn register(mut self, stage: Arc<dyn Stage>) -> Self {
        self.registered.push(stage);
        self
    }

    /// Validates the registration set and builds the registry.
    ///
    /// Fatal configuration errors: a missing or duplicated stage, or a
    /// stage requiring a slot no earlier stage produces. A stage with an
    /// empty requirement set may run first.
    pub fn build(self) -> Result<StageRegistry, RegistryError> {
        let mut by_id: HashMap<StageId, Arc<dyn Stage>> = HashMap::new();

        for stage in self.registered {
            let id = stage.id();
            if by_id.insert(id, stage).is_some() {
                return Err(RegistryError::duplicate_stage(id.as_str()));
            }
        }

        let mut produced: Vec<ContextSlot> = Vec::new();
        for id in StageId::ordered() {
            let stage = by_id
                .get(&id)
                .ok_or_else(|| RegistryError::missing_stage(id.as_str()))?;

            for requirement in stage.requires() {
                if !produced.contains(requirement) {
                    return Err(RegistryError::unsatisfiable(
                        id.as_str(),
                        requirement.field_name(),
                    ));
                }
            }
            produced.push(id.output_slot());
        }

        let take = |id: StageId, by_id: &mut HashMap<StageId, Arc<dyn Stage>>| {
            by_id
                .remove(&id)
                .ok_or_else(|| RegistryError::missing_stage(id.as_str()))
        };

        Ok(StageRegistry {
            stages: [
                take(StageId::Planning, &mut by_id)?,
                take(StageId::Mapping, &mut by_id)?,
                take(StageId::Composition, &mut by_id)?,
                take(StageId::Validation, &mut by_id)?,
            ],
        })
    }
}
