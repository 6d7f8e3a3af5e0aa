//! Planning stage: parse the natural-language request into a structured
//! plan of intent, entities, filters, and aggregations.

use super::Stage;
use crate::context::{
    AggregateFunction, Aggregation, ContextSlot, Entity, FilterCondition, PlanningOutput,
    QueryIntent, WorkflowContext,
};
use crate::errors::WorkflowError;
use crate::registry::StageId;
use async_trait::async_trait;
use regex::Regex;

const AGGREGATE_KEYWORDS: &[&str] = &["count", "sum", "average", "avg", "total"];
const FILTER_KEYWORDS: &[&str] = &["where", "filter", "only"];

/// Extracts a structured plan from the raw query text.
///
/// The extraction is keyword- and schema-driven: entities are recognized
/// by matching schema table names (and their naive singulars) against the
/// query, so the stage needs no vocabulary of its own.
#[derive(Debug)]
pub struct PlanningStage {
    comparison: Regex,
    limit: Regex,
    order_by: Regex,
}

impl PlanningStage {
    /// Creates the planning stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            comparison: Regex::new(r"(\w+)\s*(>=|<=|>|<)\s*(\d+)").expect("static pattern"),
            limit: Regex::new(r"\blimit\s+(\d+)\b").expect("static pattern"),
            order_by: Regex::new(r"\border(?:ed)?\s+by\s+(\w+)\b").expect("static pattern"),
        }
    }

    fn classify_intent(query: &str) -> QueryIntent {
        if AGGREGATE_KEYWORDS.iter().any(|kw| query.contains(kw)) {
            QueryIntent::Aggregate
        } else if FILTER_KEYWORDS.iter().any(|kw| query.contains(kw)) {
            QueryIntent::Filter
        } else {
            QueryIntent::Select
        }
    }

    fn extract_entities(ctx: &WorkflowContext, query: &str) -> Vec<Entity> {
        ctx.schema
            .tables
            .keys()
            .filter(|table| {
                query.contains(table.as_str())
                    || query.contains(table.trim_end_matches('s'))
            })
            .map(Entity::table)
            .collect()
    }

    fn extract_filters(&self, query: &str) -> Vec<FilterCondition> {
        let mut filters = Vec::new();

        if query.contains("active") {
            let value = if query.contains("inactive") { "inactive" } else { "active" };
            filters.push(FilterCondition::new("status", "=", value));
        }

        for capture in self.comparison.captures_iter(query) {
            filters.push(FilterCondition::new(&capture[1], &capture[2], &capture[3]));
        }

        filters
    }

    fn extract_aggregations(ctx: &WorkflowContext, query: &str) -> Vec<Aggregation> {
        let mut aggregations = Vec::new();

        if query.contains("count") {
            aggregations.push(Aggregation::new(AggregateFunction::Count, "*"));
        }
        if query.contains("sum") {
            if let Some(column) = first_mentioned_column(ctx, query) {
                aggregations.push(Aggregation::new(AggregateFunction::Sum, column));
            }
        }
        if query.contains("average") || query.contains("avg") {
            if let Some(column) = first_mentioned_column(ctx, query) {
                aggregations.push(Aggregation::new(AggregateFunction::Avg, column));
            }
        }

        aggregations
    }

    fn extract_limit(&self, query: &str) -> Option<u64> {
        self.limit
            .captures(query)
            .and_then(|capture| capture[1].parse().ok())
    }

    fn extract_order_by(&self, query: &str) -> Option<String> {
        self.order_by.captures(query).map(|capture| {
            let column = &capture[1];
            if column == "date" {
                "created_at".to_string()
            } else {
                column.to_string()
            }
        })
    }
}

impl Default for PlanningStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the first schema column (in table order) mentioned in the
/// query, skipping bare "id" columns that match too eagerly.
fn first_mentioned_column(ctx: &WorkflowContext, query: &str) -> Option<String> {
    ctx.schema
        .tables
        .values()
        .flat_map(|table| table.columns.iter())
        .find(|column| column.as_str() != "id" && query.contains(column.as_str()))
        .cloned()
}

#[async_trait]
impl Stage for PlanningStage {
    fn id(&self) -> StageId {
        StageId::Planning
    }

    fn requires(&self) -> &[ContextSlot] {
        &[]
    }

    async fn execute(&self, mut ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        let query = ctx.query.to_lowercase();

        let output = PlanningOutput {
            intent: Self::classify_intent(&query),
            entities: Self::extract_entities(&ctx, &query),
            filters: self.extract_filters(&query),
            aggregations: Self::extract_aggregations(&ctx, &query),
            limit: self.extract_limit(&query),
            order_by: self.extract_order_by(&query),
        };

        tracing::debug!(
            workflow_id = %ctx.workflow_id,
            intent = %output.intent,
            entities = output.entities.len(),
            filters = output.filters.len(),
            "planning extracted structured request"
        );

        ctx.planning_output = Some(output);
        Ok(ctx)
    }
}
