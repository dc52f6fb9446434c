//! Catalog module
//!
//! This module contains table schemas, column data types and the schema cache.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::Catalog;
pub use schema::{Column, TableBuilder, TableSchema};
pub use types::DataType;
