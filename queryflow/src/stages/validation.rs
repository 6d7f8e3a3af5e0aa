//! Validation stage: static checks over the composed query, producing
//! the feedback that drives the retry loop.

use super::Stage;
use crate::context::{ContextSlot, QueryIntent, ValidationOutput, WorkflowContext};
use crate::errors::{StageExecutionError, WorkflowError};
use crate::registry::StageId;
use async_trait::async_trait;

const DANGEROUS_PATTERNS: &[&str] = &[";--", "; --", "drop table", "delete from", "update set"];
const AGGREGATE_MARKERS: &[&str] = &["count(", "sum(", "avg(", "max(", "min("];

/// Judges the composed query against basic SQL shape rules and the
/// original planning intent.
///
/// A rejection here is not an error: it produces a structurally valid
/// output whose validity flag is false, which the engine turns into a
/// bounded retry of the composition sub-path.
#[derive(Debug, Default)]
pub struct ValidationStage;

impl ValidationStage {
    /// Creates the validation stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn collect_errors(ctx: &WorkflowContext, sql: &str) -> Vec<String> {
        let mut errors = Vec::new();

        if !sql.starts_with("select") {
            errors.push("Query must start with SELECT".to_string());
        }
        if !sql.contains("from") {
            errors.push("Query must include FROM clause".to_string());
        }

        for pattern in DANGEROUS_PATTERNS {
            if sql.contains(pattern) {
                errors.push(format!(
                    "Potentially dangerous SQL pattern detected: {pattern}"
                ));
            }
        }

        if let Some(planning) = &ctx.planning_output {
            if planning.intent == QueryIntent::Aggregate
                && !AGGREGATE_MARKERS.iter().any(|marker| sql.contains(marker))
            {
                errors.push(
                    "Query should include aggregation functions based on intent".to_string(),
                );
            }
            if !planning.filters.is_empty() && !sql.contains("where") {
                errors.push("Query should include WHERE clause for filters".to_string());
            }
            if planning.limit.is_some() && !sql.contains("limit") {
                errors.push("Query should include LIMIT clause as requested".to_string());
            }
        }

        errors
    }

    fn build_feedback(ctx: &WorkflowContext, sql: &str, errors: &[String]) -> String {
        let mut parts = Vec::new();

        if !errors.is_empty() {
            parts.push("Issues found:".to_string());
            parts.extend(errors.iter().map(|error| format!("- {error}")));
        }

        if let Some(planning) = &ctx.planning_output {
            if planning.intent == QueryIntent::Aggregate
                && !AGGREGATE_MARKERS.iter().any(|marker| sql.contains(marker))
            {
                parts.push(
                    "Suggestion: Add appropriate aggregation functions (COUNT, SUM, AVG)"
                        .to_string(),
                );
            }
            if !planning.filters.is_empty() && !sql.contains("where") {
                parts.push("Suggestion: Add WHERE clause to apply filters".to_string());
            }
        }

        parts.join("\n")
    }
}

#[async_trait]
impl Stage for ValidationStage {
    fn id(&self) -> StageId {
        StageId::Validation
    }

    fn requires(&self) -> &[ContextSlot] {
        &[ContextSlot::Composition]
    }

    async fn execute(&self, mut ctx: WorkflowContext) -> Result<WorkflowContext, WorkflowError> {
        let sql = ctx
            .composition_output
            .as_ref()
            .map(|output| output.sql_query.to_lowercase().trim().to_string())
            .ok_or_else(|| {
                StageExecutionError::new(
                    self.id().as_str(),
                    "composition output not present in context",
                )
            })?;

        let errors = Self::collect_errors(&ctx, &sql);

        let output = if errors.is_empty() {
            ValidationOutput::valid("query accepted by static analysis")
        } else {
            let feedback = Self::build_feedback(&ctx, &sql, &errors);
            tracing::debug!(
                workflow_id = %ctx.workflow_id,
                errors = errors.len(),
                "validation rejected composed query"
            );
            let mut rejection = ValidationOutput::invalid(errors, feedback.clone());
            rejection.query_output = Some("query validation failed".to_string());
            // Mirror the feedback onto the context so a retry pass sees it.
            ctx.feedback = Some(feedback);
            rejection
        };

        ctx.validation_output = Some(output);
        Ok(ctx)
    }
}
