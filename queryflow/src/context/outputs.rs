//! Typed per-stage output records.
//!
//! Each record is populated by exactly one stage and never mutated by any
//! other stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The classified intent of a natural-language query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// A plain projection over one or more tables.
    Select,
    /// A projection narrowed by filter conditions.
    Filter,
    /// A query dominated by aggregate functions.
    Aggregate,
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "select"),
            Self::Filter => write!(f, "filter"),
            Self::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// The kind of entity extracted from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A table reference.
    Table,
    /// A column reference.
    Column,
}

/// An entity extracted by the planning stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity name as it appeared in the query.
    pub name: String,
    /// The kind of entity.
    pub kind: EntityKind,
}

impl Entity {
    /// Creates a table entity.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Table,
        }
    }

    /// Creates a column entity.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntityKind::Column,
        }
    }
}

/// A filter condition extracted from a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// The filtered column.
    pub column: String,
    /// The comparison operator (e.g. "=", ">", "LIKE").
    pub operator: String,
    /// The comparison value.
    pub value: String,
}

impl FilterCondition {
    /// Creates a new filter condition.
    #[must_use]
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// An aggregate function over a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    /// COUNT
    Count,
    /// SUM
    Sum,
    /// AVG
    Avg,
    /// MAX
    Max,
    /// MIN
    Min,
}

impl AggregateFunction {
    /// Returns the SQL spelling of the function.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// An aggregation extracted from a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// The aggregate function.
    pub function: AggregateFunction,
    /// The aggregated column ("*" for row counts).
    pub column: String,
}

impl Aggregation {
    /// Creates a new aggregation.
    #[must_use]
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: column.into(),
        }
    }
}

/// Output of the planning stage: the structured reading of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningOutput {
    /// The classified intent.
    pub intent: QueryIntent,
    /// Extracted entities.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Extracted filter conditions.
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    /// Extracted aggregations.
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    /// Requested row limit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Requested ordering column, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

/// A planned entity resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedEntity {
    /// The entity name from the planning output.
    pub entity_name: String,
    /// The resolved table.
    pub table: String,
    /// The resolved column, when the entity was column-like.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// A filter condition with its column resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedFilter {
    /// The original condition.
    pub condition: FilterCondition,
    /// The qualified column ("table.column" when resolvable).
    pub mapped_column: String,
}

/// An aggregation with its column resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedAggregation {
    /// The original aggregation.
    pub aggregation: Aggregation,
    /// The qualified column.
    pub mapped_column: String,
}

/// Output of the mapping stage: planning output resolved to the schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MappingOutput {
    /// Resolved entities.
    #[serde(default)]
    pub mapped_entities: Vec<MappedEntity>,
    /// Resolved filters.
    #[serde(default)]
    pub mapped_filters: Vec<MappedFilter>,
    /// Resolved aggregations.
    #[serde(default)]
    pub mapped_aggregations: Vec<MappedAggregation>,
    /// Resolved ordering column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_order_by: Option<String>,
}

/// Output of the composition stage: the generated query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionOutput {
    /// The composed SQL statement.
    pub sql_query: String,
}

impl CompositionOutput {
    /// Creates a composition output.
    #[must_use]
    pub fn new(sql_query: impl Into<String>) -> Self {
        Self {
            sql_query: sql_query.into(),
        }
    }
}

/// Output of the validation stage.
///
/// An invalid result here is ordinary data, not an error: it drives the
/// bounded retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutput {
    /// Whether the composed query was accepted.
    pub is_valid: bool,
    /// Error descriptions, when rejected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Human-readable feedback used to drive retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Output of the validation check itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_output: Option<String>,
}

impl ValidationOutput {
    /// Creates an accepting validation output.
    #[must_use]
    pub fn valid(query_output: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            feedback: None,
            query_output: Some(query_output.into()),
        }
    }

    /// Creates a rejecting validation output.
    #[must_use]
    pub fn invalid(errors: Vec<String>, feedback: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            feedback: Some(feedback.into()),
            query_output: None,
        }
    }
}
