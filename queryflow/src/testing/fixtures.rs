//! Canned schemas, contexts, and stage outputs.

use crate::context::{
    AggregateFunction, Aggregation, CompositionOutput, Entity, FilterCondition, MappedEntity,
    MappedFilter, MappingOutput, PlanningOutput, QueryIntent, SchemaDescriptor, WorkflowContext,
};

/// A three-table schema mirroring a small web-shop database.
#[must_use]
pub fn sample_schema() -> SchemaDescriptor {
    SchemaDescriptor::new()
        .with_table("users", ["id", "name", "status", "age"])
        .with_table("orders", ["id", "user_id", "total"])
        .with_table("products", ["id", "name", "price"])
}

/// A pending context over [`sample_schema`].
#[must_use]
pub fn pending_context(query: &str) -> WorkflowContext {
    WorkflowContext::new(query, sample_schema())
}

/// A minimal aggregate-intent planning output.
#[must_use]
pub fn canned_planning_output() -> PlanningOutput {
    PlanningOutput {
        intent: QueryIntent::Aggregate,
        entities: vec![Entity::table("users")],
        filters: vec![FilterCondition::new("status", "=", "active")],
        aggregations: vec![Aggregation::new(AggregateFunction::Count, "*")],
        limit: None,
        order_by: None,
    }
}

/// A mapping output matching [`canned_planning_output`].
#[must_use]
pub fn canned_mapping_output() -> MappingOutput {
    MappingOutput {
        mapped_entities: vec![MappedEntity {
            entity_name: "users".to_string(),
            table: "users".to_string(),
            column: None,
        }],
        mapped_filters: vec![MappedFilter {
            condition: FilterCondition::new("status", "=", "active"),
            mapped_column: "users.status".to_string(),
        }],
        mapped_aggregations: vec![],
        mapped_order_by: None,
    }
}

/// A composition output matching the canned plan.
#[must_use]
pub fn canned_composition_output() -> CompositionOutput {
    CompositionOutput::new("SELECT COUNT(*) FROM users WHERE users.status = 'active'")
}
