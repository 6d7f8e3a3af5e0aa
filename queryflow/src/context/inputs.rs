//! Immutable workflow inputs: the schema description.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column metadata for a single table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// The table's column names.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl TableDescriptor {
    /// Creates a descriptor from column names.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Returns true if the table has the given column.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// A nested description of the target database schema.
///
/// An ordered map keeps entity resolution and SQL assembly deterministic
/// for a given input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Tables keyed by name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableDescriptor>,
}

impl SchemaDescriptor {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with the given columns.
    #[must_use]
    pub fn with_table(
        mut self,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.tables.insert(
            name.into(),
            TableDescriptor::new(columns.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Returns the first table whose columns contain `column`.
    #[must_use]
    pub fn table_with_column(&self, column: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|(_, table)| table.has_column(column))
            .map(|(name, _)| name.as_str())
    }

    /// Returns the name of the first table, if any.
    #[must_use]
    pub fn first_table(&self) -> Option<&str> {
        self.tables.keys().next().map(String::as_str)
    }

    /// Returns true if the schema declares no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
