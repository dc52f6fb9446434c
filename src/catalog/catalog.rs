//! Known table schemas
//!
//! The catalog caches the column set of every table the gateway has touched.
//! It is shareable between gateways, so one `describe` serves all of them.
//! Entries are keyed by `database.table`, so gateways on different databases
//! can share one catalog.

use super::schema::TableSchema;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Cache of table schemas by qualified table name
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog key of `table`. A `db.table` name is kept as is; a bare name is
    /// placed in `database`.
    pub fn key(database: &str, table: &str) -> String {
        if table.contains('.') {
            table.to_string()
        } else {
            format!("{}.{}", database, table)
        }
    }

    /// Register (or replace) the schema stored under `key`
    pub fn register(&self, key: impl Into<String>, schema: TableSchema) -> Arc<TableSchema> {
        let schema = Arc::new(schema);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(key.into(), schema.clone());
        schema
    }

    /// Get a table by key
    pub fn get_table(&self, key: &str) -> Result<Arc<TableSchema>> {
        self.lookup(key)
            .ok_or_else(|| Error::TableNotFound(key.to_string()))
    }

    /// Get a table by key if it is known
    pub fn lookup(&self, key: &str) -> Option<Arc<TableSchema>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(key).cloned()
    }

    /// List all known keys, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }
}
