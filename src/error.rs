//! Error types for rowgate
//!
//! Every failure the gateway can surface is a variant of [`Error`]. Variants are
//! grouped into the categories returned by [`Error::kind`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which write operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Insert => write!(f, "INSERT"),
            WriteOp::Update => write!(f, "UPDATE"),
            WriteOp::Delete => write!(f, "DELETE"),
        }
    }
}

/// Integrity constraint reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    NotNull,
    ForeignKey,
    Check,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Unique => write!(f, "unique"),
            ConstraintKind::NotNull => write!(f, "not null"),
            ConstraintKind::ForeignKey => write!(f, "foreign key"),
            ConstraintKind::Check => write!(f, "check"),
        }
    }
}

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or authentication failure while connecting
    Connection,
    /// Operation attempted while disconnected
    State,
    /// Read statement rejected
    Query,
    /// Insert, update or delete rejected
    Write,
    /// Input refused before reaching the server
    Validation,
    /// Operation exceeded its time limit
    Timeout,
    /// Configuration could not be loaded
    Config,
}

/// The main error type for rowgate
#[derive(Error, Debug)]
pub enum Error {
    // ========== Connection Errors ==========
    #[error("Connection error: could not connect to {address}: {message}")]
    Connection { address: String, message: String },

    // ========== State Errors ==========
    #[error("State error: cannot {operation} while disconnected")]
    NotConnected { operation: &'static str },

    // ========== Query Errors ==========
    #[error("Query error: {message}")]
    Query { message: String },

    // ========== Write Errors ==========
    #[error("Write error: {operation} on table '{table}' failed: {message}")]
    Write {
        operation: WriteOp,
        table: String,
        constraint: Option<ConstraintKind>,
        message: String,
    },

    // ========== Validation Errors ==========
    #[error("Validation error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Validation error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Validation error: null value not allowed for column '{0}'")]
    NullNotAllowed(String),

    #[error("Validation error: row for table '{0}' has no columns")]
    EmptyRow(String),

    #[error("Validation error: rows for table '{0}' do not share the same columns")]
    RowShapeMismatch(String),

    #[error("Validation error: invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Validation error: invalid filter: {0}")]
    InvalidFilter(String),

    // ========== Predicate Parse Errors ==========
    #[error("Lexer error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Lexer error: unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Lexer error: invalid number format at position {0}")]
    InvalidNumber(usize),

    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    // ========== Timeout Errors ==========
    #[error("Timeout error: {operation} did not finish within {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    // ========== Configuration Errors ==========
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::NotConnected { .. } => ErrorKind::State,
            Error::Query { .. } => ErrorKind::Query,
            Error::Write { .. } => ErrorKind::Write,
            Error::TableNotFound(_)
            | Error::ColumnNotFound(_, _)
            | Error::NullNotAllowed(_)
            | Error::EmptyRow(_)
            | Error::RowShapeMismatch(_)
            | Error::InvalidIdentifier(_)
            | Error::InvalidFilter(_)
            | Error::UnexpectedCharacter(_, _)
            | Error::UnterminatedString(_)
            | Error::InvalidNumber(_)
            | Error::UnexpectedToken { .. } => ErrorKind::Validation,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Config(_) | Error::IoError(_) => ErrorKind::Config,
        }
    }

    /// The violated constraint, for write errors the server attributed to one
    pub fn constraint(&self) -> Option<ConstraintKind> {
        match self {
            Error::Write { constraint, .. } => *constraint,
            _ => None,
        }
    }
}

/// Result type alias for rowgate operations
pub type Result<T> = std::result::Result<T, Error>;
