//! Table schema definitions
//!
//! A [`TableSchema`] is the known column set of one table. Rows and filters are
//! checked against it before any statement is sent to the server.

use super::types::DataType;
use crate::error::{Error, Result};
use crate::row::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Column position (0-indexed)
    pub position: usize,
    /// Is this column nullable?
    pub nullable: bool,
    /// Default value expression (as reported by the server)
    pub default: Option<String>,
    /// Is this part of the primary key?
    pub primary_key: bool,
    /// Does the server generate values for this column?
    pub auto_increment: bool,
}

impl Column {
    /// Create a new column with minimal required fields
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            position: 0,
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// Set nullable flag
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set default value
    pub fn default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set primary key flag
    pub fn primary_key(mut self, pk: bool) -> Self {
        self.primary_key = pk;
        if pk {
            self.nullable = false;
        }
        self
    }

    /// Set auto-increment flag
    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }
}

/// The column set of one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    name: String,
    /// Ordered list of columns
    columns: Vec<Column>,
    /// Lowercased column name to index (MySQL column names are case-insensitive)
    name_to_index: HashMap<String, usize>,
}

impl TableSchema {
    /// Create a new schema without columns
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            name_to_index: HashMap::new(),
        }
    }

    /// Create a schema from a list of columns
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let mut schema = Self::new(name);
        for col in columns {
            schema.add_column(col);
        }
        schema
    }

    /// Start a fluent [`TableBuilder`]
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Add a column to the schema
    pub fn add_column(&mut self, mut column: Column) {
        column.position = self.columns.len();
        self.name_to_index
            .insert(column.name.to_lowercase(), column.position);
        self.columns.push(column);
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.name_to_index
            .get(&name.to_lowercase())
            .map(|&idx| &self.columns[idx])
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.name_to_index.contains_key(&name.to_lowercase())
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Fail on the first name that is not a column of this table
    pub fn ensure_columns<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in names {
            if !self.has_column(name) {
                return Err(Error::ColumnNotFound(name.to_string(), self.name.clone()));
            }
        }
        Ok(())
    }

    /// Check a row bound for this table: it must name at least one column,
    /// every column must exist, and NULL is refused for NOT NULL columns
    /// unless the server generates the value (AUTO_INCREMENT).
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.is_empty() {
            return Err(Error::EmptyRow(self.name.clone()));
        }

        for (name, value) in row {
            let column = self
                .get_column(name)
                .ok_or_else(|| Error::ColumnNotFound(name.clone(), self.name.clone()))?;
            if value.is_null() && !column.nullable && !column.auto_increment {
                return Err(Error::NullNotAllowed(column.name.clone()));
            }
        }

        Ok(())
    }
}

/// Builder for table schemas with a fluent API
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
}

impl TableBuilder {
    /// Start building a new table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a nullable column
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Add an `INT AUTO_INCREMENT PRIMARY KEY` column
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.columns.push(
            Column::new(name, DataType::Int)
                .primary_key(true)
                .auto_increment(true),
        );
        self
    }

    /// Add a NOT NULL column
    pub fn column_not_null(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns
            .push(Column::new(name, data_type).nullable(false));
        self
    }

    /// Add a fully specified column
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Finish the schema
    pub fn build(self) -> TableSchema {
        TableSchema::from_columns(self.name, self.columns)
    }
}
