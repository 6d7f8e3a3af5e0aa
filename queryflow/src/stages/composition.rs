//! Composition stage: assemble the SQL statement from the mapped plan.

use super::Stage;
use crate::context::{CompositionOutput, ContextSlot, MappingOutput, WorkflowContext};
use crate::errors::{StageExecutionError, WorkflowError};
use crate::registry::StageId;
use async_trait::async_trait;

/// Assembles a `SELECT` statement from the mapping output.
///
/// Runs on the main pass and again on every retry pass, re-deriving the
/// query text from the same mapping output.
#[derive(Debug, Default)]
pub struct CompositionStage;

impl CompositionStage {
    /// Creates the composition stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn select_clause(mapping: &MappingOutput) -> String {
        if !mapping.mapped_aggregations.is_empty() {
            let parts: Vec<String> = mapping
                .mapped_aggregations
                .iter()
                .map(|agg| format!("{}({})", agg.aggregation.function.as_sql(), agg.mapped_column))
                .collect();
            return format!("SELECT {}", parts.join(", "));
        }

        if mapping.mapped_entities.is_empty() {
            return "SELECT *".to_string();
        }

        let parts: Vec<String> = mapping
            .mapped_entities
            .iter()
            .map(|entity| match &entity.column {
                Some(column) => format!("{}.{column}", entity.table),
                None => format!("{}.*", entity.table),
            })
            .collect();
        format!("SELECT {}", parts.join(", "))
    }

    fn where_clause(mapping: &MappingOutput) -> Option<String> {
        if mapping.mapped_filters.is_empty() {
            return None;
        }

        let conditions: Vec<String> = mapping
            .mapped_filters
            .iter()
            .map(|filter| {
                let column = &filter.mapped_column;
                let operator = &filter.condition.operator;
                let value = &filter.condition.value;

                if operator.eq_ignore_ascii_case("like") {
                    format!("{column} {operator} '%{value}%'")
                } else if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
                    format!("{column} {operator} {value}")
                } else {
                    format!("{column} {operator} '{value}'")
                }
            })
            .collect();

        Some(format!("WHERE {}", conditions.join(" AND ")))
    }
}

#[async_trait]
impl Stage for CompositionStage {
    fn id(&self) -> StageId {
        StageId::Composition
    }

    fn requires(&self) -> &[ContextSlot] {
        &[ContextSlot::Mapping]
    }

    async fn execute(&self, mut ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        let mapping = ctx.mapping_output.as_ref().ok_or_else(|| {
            StageExecutionError::new(self.id().as_str(), "mapping output not present in context")
        })?;

        let mut parts = vec![Self::select_clause(mapping)];

        let mut tables: Vec<&str> = Vec::new();
        for entity in &mapping.mapped_entities {
            if !tables.contains(&entity.table.as_str()) {
                tables.push(&entity.table);
            }
        }
        if tables.is_empty() {
            let fallback = ctx.schema.first_table().ok_or_else(|| {
                StageExecutionError::new(self.id().as_str(), "schema declares no tables")
            })?;
            tables.push(fallback);
        }
        parts.push(format!("FROM {}", tables.join(", ")));

        if let Some(where_clause) = Self::where_clause(mapping) {
            parts.push(where_clause);
        }

        if let Some(order_by) = &mapping.mapped_order_by {
            parts.push(format!("ORDER BY {order_by}"));
        }

        if let Some(limit) = ctx.planning_output.as_ref().and_then(|p| p.limit) {
            parts.push(format!("LIMIT {limit}"));
        }

        let sql_query = parts.join(" ");
        tracing::debug!(workflow_id = %ctx.workflow_id, sql = %sql_query, "composed query");

        ctx.composition_output = Some(CompositionOutput::new(sql_query));
        Ok(ctx)
    }
}
