//! Connection seam
//!
//! The gateway talks to the server only through these traits. [`MySqlConnector`]
//! is the real implementation; tests plug in their own.
//!
//! [`MySqlConnector`]: super::mysql::MySqlConnector

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConnectionConfig;
use crate::error::ConstraintKind;
use crate::row::Row;
use crate::sql::Statement;

/// Failure reported by a driver, before the gateway maps it onto [`Error`]
///
/// [`Error`]: crate::Error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The server refused a write because of an integrity constraint
    #[error("{message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    /// The server rejected the statement
    #[error("{0}")]
    Rejected(String),

    /// The transport failed; the connection can no longer be used
    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// True when the connection that produced this error is unusable
    pub fn is_disconnect(&self) -> bool {
        matches!(self, DriverError::Disconnected(_))
    }
}

/// Result of a write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows inserted, changed or deleted
    pub rows_affected: u64,
    /// Value generated for an AUTO_INCREMENT column, if any
    pub last_insert_id: Option<u64>,
}

/// Opens connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>, DriverError>;
}

/// One open connection to the server
#[async_trait]
pub trait Connection: Send {
    /// Run a read statement and materialize every row
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, DriverError>;

    /// Run a write statement
    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, DriverError>;

    /// Run write statements in one transaction; either all apply or none.
    /// The outcome sums affected rows and keeps the first generated id.
    async fn execute_batch(
        &mut self,
        statements: &[Statement],
    ) -> Result<ExecOutcome, DriverError>;

    /// Round-trip to the server
    async fn ping(&mut self) -> Result<(), DriverError>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}
