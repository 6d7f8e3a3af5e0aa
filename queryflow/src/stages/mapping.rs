//! Mapping stage: resolve the structured plan against the schema.

use super::Stage;
use crate::context::{
    ContextSlot, EntityKind, MappedAggregation, MappedEntity, MappedFilter, MappingOutput,
    SchemaDescriptor, WorkflowContext,
};
use crate::errors::{StageExecutionError, WorkflowError};
use crate::registry::StageId;
use async_trait::async_trait;

/// Resolves planned entities, filters, and aggregations to concrete
/// `table.column` references.
///
/// Columns are searched in the tables the plan mapped first, then across
/// the whole schema; unresolvable columns pass through unqualified so the
/// validation stage can judge the composed query as a whole.
#[derive(Debug, Default)]
pub struct MappingStage;

impl MappingStage {
    /// Creates the mapping stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Qualifies `column` against the mapped tables first, then the schema.
fn qualify_column(
    schema: &SchemaDescriptor,
    mapped_tables: &[String],
    column: &str,
) -> Option<String> {
    mapped_tables
        .iter()
        .find(|table| {
            schema
                .tables
                .get(*table)
                .is_some_and(|descriptor| descriptor.has_column(column))
        })
        .map(String::as_str)
        .or_else(|| schema.table_with_column(column))
        .map(|table| format!("{table}.{column}"))
}

#[async_trait]
impl Stage for MappingStage {
    fn id(&self) -> StageId {
        StageId::Mapping
    }

    fn requires(&self) -> &[ContextSlot] {
        &[ContextSlot::Planning]
    }

    async fn execute(&self, mut ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        let planning = ctx.planning_output.as_ref().ok_or_else(|| {
            StageExecutionError::new(self.id().as_str(), "planning output not present in context")
        })?;

        let mut mapped_entities = Vec::new();
        for entity in &planning.entities {
            match entity.kind {
                EntityKind::Table => {
                    if ctx.schema.tables.contains_key(&entity.name) {
                        mapped_entities.push(MappedEntity {
                            entity_name: entity.name.clone(),
                            table: entity.name.clone(),
                            column: None,
                        });
                    }
                }
                EntityKind::Column => {
                    if let Some(table) = ctx.schema.table_with_column(&entity.name) {
                        mapped_entities.push(MappedEntity {
                            entity_name: entity.name.clone(),
                            table: table.to_string(),
                            column: Some(entity.name.clone()),
                        });
                    }
                }
            }
        }

        let mapped_tables: Vec<String> =
            mapped_entities.iter().map(|e| e.table.clone()).collect();

        let mapped_filters = planning
            .filters
            .iter()
            .map(|condition| MappedFilter {
                condition: condition.clone(),
                mapped_column: qualify_column(&ctx.schema, &mapped_tables, &condition.column)
                    .unwrap_or_else(|| condition.column.clone()),
            })
            .collect();

        let mapped_aggregations = planning
            .aggregations
            .iter()
            .map(|aggregation| MappedAggregation {
                aggregation: aggregation.clone(),
                mapped_column: if aggregation.column == "*" {
                    "*".to_string()
                } else {
                    qualify_column(&ctx.schema, &mapped_tables, &aggregation.column)
                        .unwrap_or_else(|| aggregation.column.clone())
                },
            })
            .collect();

        let mapped_order_by = planning.order_by.as_ref().map(|column| {
            qualify_column(&ctx.schema, &mapped_tables, column).unwrap_or_else(|| {
                // "created_at" is synthesized by planning and may not exist
                // in the schema; anchor it to the main mapped table.
                if column == "created_at" {
                    let table = mapped_tables
                        .first()
                        .map(String::as_str)
                        .or_else(|| ctx.schema.first_table())
                        .unwrap_or("users");
                    format!("{table}.created_at")
                } else {
                    column.clone()
                }
            })
        });

        ctx.mapping_output = Some(MappingOutput {
            mapped_entities,
            mapped_filters,
            mapped_aggregations,
            mapped_order_by,
        });
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        AggregateFunction, Aggregation, Entity, FilterCondition, PlanningOutput, QueryIntent,
    };

    fn planned_context() -> WorkflowContext {
        let schema = SchemaDescriptor::new()
            .with_table("users", ["id", "name", "status"])
            .with_table("products", ["id", "price"]);
        let mut ctx = WorkflowContext::new("count all active users", schema);
        ctx.planning_output = Some(PlanningOutput {
            intent: QueryIntent::Aggregate,
            entities: vec![Entity::table("users")],
            filters: vec![FilterCondition::new("status", "=", "active")],
            aggregations: vec![Aggregation::new(AggregateFunction::Count, "*")],
            limit: None,
            order_by: None,
        });
        ctx
    }

    #[tokio::test]
    async fn test_maps_entities_and_qualifies_filters() {
        let stage = MappingStage::new();
        let ctx = stage.execute(planned_context()).await.unwrap();
        let output = ctx.mapping_output.unwrap();

        assert_eq!(output.mapped_entities.len(), 1);
        assert_eq!(output.mapped_entities[0].table, "users");
        assert_eq!(output.mapped_filters[0].mapped_column, "users.status");
        assert_eq!(output.mapped_aggregations[0].mapped_column, "*");
    }

    #[tokio::test]
    async fn test_unknown_entity_is_dropped() {
        let mut ctx = planned_context();
        if let Some(planning) = ctx.planning_output.as_mut() {
            planning.entities.push(Entity::table("invoices"));
        }

        let stage = MappingStage::new();
        let ctx = stage.execute(ctx).await.unwrap();
        let output = ctx.mapping_output.unwrap();

        assert_eq!(output.mapped_entities.len(), 1);
    }

    #[tokio::test]
    async fn test_column_entity_resolves_owning_table() {
        let mut ctx = planned_context();
        if let Some(planning) = ctx.planning_output.as_mut() {
            planning.entities.push(Entity::column("price"));
        }

        let stage = MappingStage::new();
        let ctx = stage.execute(ctx).await.unwrap();
        let output = ctx.mapping_output.unwrap();

        let column_entity = &output.mapped_entities[1];
        assert_eq!(column_entity.table, "products");
        assert_eq!(column_entity.column.as_deref(), Some("price"));
    }

    #[tokio::test]
    async fn test_unresolvable_filter_passes_through() {
        let mut ctx = planned_context();
        if let Some(planning) = ctx.planning_output.as_mut() {
            planning.filters = vec![FilterCondition::new("tier", "=", "gold")];
        }

        let stage = MappingStage::new();
        let ctx = stage.execute(ctx).await.unwrap();
        let output = ctx.mapping_output.unwrap();

        assert_eq!(output.mapped_filters[0].mapped_column, "tier");
    }

    #[tokio::test]
    async fn test_synthesized_created_at_anchors_to_main_table() {
        let mut ctx = planned_context();
        if let Some(planning) = ctx.planning_output.as_mut() {
            planning.order_by = Some("created_at".to_string());
        }

        let stage = MappingStage::new();
        let ctx = stage.execute(ctx).await.unwrap();
        let output = ctx.mapping_output.unwrap();

        assert_eq!(output.mapped_order_by.as_deref(), Some("users.created_at"));
    }

    #[tokio::test]
    async fn test_missing_planning_output_fails() {
        let mut ctx = planned_context();
        ctx.planning_output = None;

        let stage = MappingStage::new();
        let err = stage.execute(ctx).await.unwrap_err();
        assert!(matches!(err, WorkflowError::StageExecution(_)));
    }

    #[test]
    fn test_requires_planning_output() {
        assert_eq!(MappingStage::new().requires(), &[ContextSlot::Planning]);
    }
}
