//! SQL module
//!
//! This module contains the predicate lexer and parser, structured filters and
//! the parameterized statement builder.

pub mod filter;
pub mod lexer;
pub mod parser;
pub mod statement;
pub mod token;

pub use filter::{CompareOp, Filter};
pub use parser::FilterParser;
pub use statement::{quote_identifier, quote_table, Statement, MAX_PLACEHOLDERS};
