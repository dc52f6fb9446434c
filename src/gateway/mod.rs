//! Data-access gateway
//!
//! [`Gateway`] owns one logical connection and is the only type that performs
//! database I/O. It moves between two states:
//!
//! ```text
//! Disconnected --connect()--> Connected --close()--> Disconnected
//! ```
//!
//! A failed connect leaves it Disconnected, and so does a transport failure or
//! a timeout during any operation. Every data operation checks the state first
//! and fails with [`Error::NotConnected`] without touching the network.

pub mod connection;
pub mod mysql;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, Column, DataType, TableSchema};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result, WriteOp};
use crate::row::{Row, Value};
use crate::sql::{Filter, Statement};

pub use connection::{Connection, Connector, DriverError, ExecOutcome};
pub use mysql::MySqlConnector;

/// A gateway shared between tasks; every operation holds the lock
pub type SharedGateway = Arc<Mutex<Gateway>>;

/// Connection state of a [`Gateway`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Disconnected,
    Connected,
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayState::Disconnected => write!(f, "disconnected"),
            GatewayState::Connected => write!(f, "connected"),
        }
    }
}

const DESCRIBE_SQL: &str = "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type, \
     COLUMN_TYPE AS column_type, IS_NULLABLE AS is_nullable, \
     COLUMN_DEFAULT AS column_default, COLUMN_KEY AS column_key, EXTRA AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

/// Why a driver call did not produce a result
enum Failure {
    Driver(DriverError),
    TimedOut(Duration),
}

/// Typed access to one MySQL database over a single connection
pub struct Gateway {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    connection: Option<Box<dyn Connection>>,
    catalog: Arc<Catalog>,
}

impl Gateway {
    /// Create a disconnected gateway for a MySQL server
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, Arc::new(MySqlConnector))
    }

    /// Create a disconnected gateway that opens connections through `connector`
    pub fn with_connector(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            connection: None,
            catalog: Arc::new(Catalog::new()),
        }
    }

    /// Share a schema catalog with other gateways
    pub fn with_catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn state(&self) -> GatewayState {
        if self.connection.is_some() {
            GatewayState::Connected
        } else {
            GatewayState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Wrap the gateway for use from several tasks
    pub fn into_shared(self) -> SharedGateway {
        Arc::new(Mutex::new(self))
    }

    // ========== Lifecycle ==========

    /// Open the connection. Succeeds without I/O when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            debug!(address = %self.config.address(), "Reusing open connection");
            return Ok(());
        }

        let address = self.config.address();
        let limit = self.config.connect_timeout();

        match tokio::time::timeout(limit, self.connector.connect(&self.config)).await {
            Ok(Ok(connection)) => {
                self.connection = Some(connection);
                info!(
                    address = %address,
                    database = self.config.database(),
                    user = self.config.username(),
                    "Connected to MySQL server"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!(address = %address, error = %e, "Failed to connect to MySQL server");
                Err(Error::Connection {
                    address,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                error!(address = %address, timeout = ?limit, "Timed out connecting to MySQL server");
                Err(Error::Connection {
                    address,
                    message: format!("timed out after {:?}", limit),
                })
            }
        }
    }

    /// [`connect`](Self::connect), reporting only success
    pub async fn try_connect(&mut self) -> bool {
        self.connect().await.is_ok()
    }

    /// Release the connection. Never fails; a release error is logged and the
    /// gateway is Disconnected afterwards either way.
    pub async fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            debug!("close() called while disconnected");
            return;
        };

        let limit = self.config.connect_timeout();
        match tokio::time::timeout(limit, connection.close()).await {
            Ok(Ok(())) => info!(address = %self.config.address(), "MySQL connection closed"),
            Ok(Err(e)) => warn!(
                address = %self.config.address(),
                error = %e,
                "Error while releasing MySQL connection"
            ),
            Err(_) => warn!(
                address = %self.config.address(),
                timeout = ?limit,
                "Timed out releasing MySQL connection"
            ),
        }
    }

    /// Connect, run `f`, then close on every exit path and return what `f`
    /// returned.
    ///
    /// ```no_run
    /// # async fn demo(gateway: &mut rowgate::Gateway) -> rowgate::Result<()> {
    /// let rows = gateway
    ///     .session(|g| Box::pin(async move { g.query("SELECT 1 AS one").await }))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn session<T, F>(&mut self, f: F) -> Result<T>
    where
        F: for<'g> FnOnce(&'g mut Gateway) -> BoxFuture<'g, Result<T>>,
    {
        self.connect().await?;
        let result = f(self).await;
        self.close().await;
        result
    }

    /// Check that the server still answers
    pub async fn ping(&mut self) -> Result<()> {
        let limit = self.config.statement_timeout();
        let connection = self.connection_mut("ping")?;
        let result = with_limit(limit, connection.ping()).await;
        self.settle(result).map_err(|f| self.failure_error("ping", f))
    }

    // ========== Reads ==========

    /// Run a read statement and return every row
    pub async fn query(&mut self, statement: impl Into<Statement>) -> Result<Vec<Row>> {
        let statement = statement.into();
        self.fetch("query", &statement).await
    }

    /// Run a read statement with values for its `?` placeholders
    pub async fn query_with(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let statement = Statement::with_params(sql, params);
        self.fetch("query", &statement).await
    }

    /// `SELECT *` from a table, optionally filtered
    pub async fn find(&mut self, table: &str, filter: Option<&Filter>) -> Result<Vec<Row>> {
        self.require_connected("find")?;
        let schema = self.describe(table).await?;
        if let Some(filter) = filter {
            schema.ensure_columns(filter.columns())?;
        }

        let statement = Statement::select(table, &[], filter)?;
        self.fetch("find", &statement).await
    }

    // ========== Writes ==========

    /// Insert one row and return the generated AUTO_INCREMENT id, if any
    pub async fn insert(&mut self, table: &str, row: &Row) -> Result<Option<u64>> {
        self.require_connected("insert")?;
        let schema = self.describe(table).await?;
        schema.validate_row(row)?;

        let statement = Statement::insert(table, row)?;
        let outcome = self.execute(WriteOp::Insert, table, &statement).await?;
        Ok(outcome.last_insert_id)
    }

    /// Insert several rows sharing one column set. Either every row is
    /// written or none is. Returns the number of rows inserted.
    pub async fn insert_many(&mut self, table: &str, rows: &[Row]) -> Result<u64> {
        self.require_connected("insert")?;
        if rows.is_empty() {
            return Ok(0);
        }

        let schema = self.describe(table).await?;
        for row in rows {
            schema.validate_row(row)?;
        }

        let statements = Statement::insert_many(table, rows)?;
        let outcome = self.execute_batch(WriteOp::Insert, table, &statements).await?;
        Ok(outcome.rows_affected)
    }

    /// Apply `changes` to every row matching `filter`; returns how many rows
    /// changed. Matching nothing is not an error.
    pub async fn update(&mut self, table: &str, changes: &Row, filter: &Filter) -> Result<u64> {
        self.require_connected("update")?;
        let schema = self.describe(table).await?;
        schema.validate_row(changes)?;
        schema.ensure_columns(filter.columns())?;

        let statement = Statement::update(table, changes, filter)?;
        let outcome = self.execute(WriteOp::Update, table, &statement).await?;
        Ok(outcome.rows_affected)
    }

    /// Delete every row matching `filter`; returns how many rows were removed
    pub async fn delete(&mut self, table: &str, filter: &Filter) -> Result<u64> {
        self.require_connected("delete")?;
        let schema = self.describe(table).await?;
        schema.ensure_columns(filter.columns())?;

        let statement = Statement::delete(table, filter)?;
        let outcome = self.execute(WriteOp::Delete, table, &statement).await?;
        Ok(outcome.rows_affected)
    }

    // ========== Schema ==========

    /// Make a table's column set known without asking the server
    pub fn register_table(&self, schema: TableSchema) -> Arc<TableSchema> {
        let key = Catalog::key(self.config.database(), schema.name());
        self.catalog.register(key, schema)
    }

    /// The column set of a table, loaded from `information_schema` on first use.
    /// `db.table` looks in `db`; a bare name looks in the configured database.
    pub async fn describe(&mut self, table: &str) -> Result<Arc<TableSchema>> {
        let key = Catalog::key(self.config.database(), table);
        if let Some(schema) = self.catalog.lookup(&key) {
            return Ok(schema);
        }

        let (database, name) = table
            .split_once('.')
            .unwrap_or((self.config.database(), table));
        let statement = Statement::with_params(
            DESCRIBE_SQL,
            vec![Value::from(database), Value::from(name)],
        );
        let rows = self.fetch("describe", &statement).await?;
        if rows.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let columns = rows
            .iter()
            .map(column_from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!(table, columns = columns.len(), "Loaded table schema");

        Ok(self
            .catalog
            .register(key, TableSchema::from_columns(table, columns)))
    }

    // ========== Internals ==========

    fn require_connected(&self, operation: &'static str) -> Result<()> {
        if self.connection.is_some() {
            Ok(())
        } else {
            Err(Error::NotConnected { operation })
        }
    }

    fn connection_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut (dyn Connection + 'static)> {
        self.connection
            .as_deref_mut()
            .ok_or(Error::NotConnected { operation })
    }

    async fn fetch(&mut self, operation: &'static str, statement: &Statement) -> Result<Vec<Row>> {
        let limit = self.config.statement_timeout();
        let connection = self.connection_mut(operation)?;
        debug!(
            operation,
            sql = statement.sql(),
            params = statement.params().len(),
            "Running read statement"
        );

        let result = with_limit(limit, connection.fetch_all(statement)).await;
        let rows = self
            .settle(result)
            .map_err(|f| self.failure_error(operation, f))?;
        debug!(operation, rows = rows.len(), "Read statement finished");
        Ok(rows)
    }

    async fn execute(
        &mut self,
        operation: WriteOp,
        table: &str,
        statement: &Statement,
    ) -> Result<ExecOutcome> {
        let limit = self.config.statement_timeout();
        let connection = self.connection_mut(write_name(operation))?;
        debug!(
            %operation,
            table,
            sql = statement.sql(),
            params = statement.params().len(),
            "Running write statement"
        );

        let result = with_limit(limit, connection.execute(statement)).await;
        let outcome = self
            .settle(result)
            .map_err(|f| self.write_error(operation, table, f))?;
        debug!(%operation, table, rows_affected = outcome.rows_affected, "Write statement finished");
        Ok(outcome)
    }

    async fn execute_batch(
        &mut self,
        operation: WriteOp,
        table: &str,
        statements: &[Statement],
    ) -> Result<ExecOutcome> {
        // The limit covers the whole transaction
        let count = u32::try_from(statements.len().max(1)).unwrap_or(u32::MAX);
        let limit = self
            .config
            .statement_timeout()
            .map(|limit| limit.saturating_mul(count));
        let connection = self.connection_mut(write_name(operation))?;
        debug!(
            %operation,
            table,
            statements = statements.len(),
            "Running write batch"
        );

        let result = with_limit(limit, connection.execute_batch(statements)).await;
        let outcome = self
            .settle(result)
            .map_err(|f| self.write_error(operation, table, f))?;
        debug!(%operation, table, rows_affected = outcome.rows_affected, "Write batch finished");
        Ok(outcome)
    }

    /// Drop the connection when the failure leaves it unusable
    fn settle<T>(
        &mut self,
        result: std::result::Result<T, Failure>,
    ) -> std::result::Result<T, Failure> {
        let unusable = match &result {
            Err(Failure::Driver(e)) => e.is_disconnect(),
            Err(Failure::TimedOut(_)) => true,
            Ok(_) => false,
        };
        if unusable && self.connection.take().is_some() {
            warn!(address = %self.config.address(), "Dropped MySQL connection after failure");
        }
        result
    }

    fn failure_error(&self, operation: &'static str, failure: Failure) -> Error {
        match failure {
            Failure::TimedOut(limit) => Error::Timeout { operation, limit },
            Failure::Driver(DriverError::Disconnected(message)) => Error::Connection {
                address: self.config.address(),
                message,
            },
            Failure::Driver(e) => Error::Query {
                message: e.to_string(),
            },
        }
    }

    fn write_error(&self, operation: WriteOp, table: &str, failure: Failure) -> Error {
        match failure {
            Failure::TimedOut(limit) => Error::Timeout {
                operation: write_name(operation),
                limit,
            },
            Failure::Driver(DriverError::Disconnected(message)) => Error::Connection {
                address: self.config.address(),
                message,
            },
            Failure::Driver(DriverError::Constraint { kind, message }) => Error::Write {
                operation,
                table: table.to_string(),
                constraint: Some(kind),
                message,
            },
            Failure::Driver(e) => Error::Write {
                operation,
                table: table.to_string(),
                constraint: None,
                message: e.to_string(),
            },
        }
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("url", &self.config.redacted_url())
            .field("state", &self.state())
            .field("tables", &self.catalog.list_tables())
            .finish()
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        if self.connection.is_some() {
            debug!(address = %self.config.address(), "Gateway dropped while connected");
        }
    }
}

async fn with_limit<T>(
    limit: Option<Duration>,
    future: impl Future<Output = std::result::Result<T, DriverError>>,
) -> std::result::Result<T, Failure> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => result.map_err(Failure::Driver),
            Err(_) => Err(Failure::TimedOut(limit)),
        },
        None => future.await.map_err(Failure::Driver),
    }
}

fn write_name(operation: WriteOp) -> &'static str {
    match operation {
        WriteOp::Insert => "insert",
        WriteOp::Update => "update",
        WriteOp::Delete => "delete",
    }
}

/// Build a column from one `information_schema.COLUMNS` row
fn column_from_row(row: &Row) -> Result<Column> {
    let text = |key: &str| row.get(key).and_then(Value::as_str);
    let required = |key: &str| {
        text(key).ok_or_else(|| Error::Query {
            message: format!("information_schema row without {}", key),
        })
    };

    let name = required("column_name")?;
    let data_type = DataType::from_mysql(required("data_type")?, required("column_type")?);

    let mut column = Column::new(name, data_type)
        .nullable(text("is_nullable").map_or(true, |v| v.eq_ignore_ascii_case("YES")))
        .primary_key(text("column_key").is_some_and(|v| v.eq_ignore_ascii_case("PRI")))
        .auto_increment(
            text("extra").is_some_and(|v| v.to_ascii_lowercase().contains("auto_increment")),
        );
    column.default = text("column_default").map(str::to_string);
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_from_information_schema_row() {
        let row = Row::new()
            .with("column_name", "id")
            .with("data_type", "int")
            .with("column_type", "int unsigned")
            .with("is_nullable", "NO")
            .with("column_default", Value::Null)
            .with("column_key", "PRI")
            .with("extra", "auto_increment");

        let column = column_from_row(&row).unwrap();
        assert_eq!(column.name, "id");
        assert_eq!(column.data_type, DataType::Int);
        assert!(!column.nullable);
        assert!(column.primary_key);
        assert!(column.auto_increment);
        assert_eq!(column.default, None);
    }

    #[test]
    fn test_column_from_binary_strings() {
        // Some servers report information_schema text as binary strings
        let row = Row::new()
            .with("column_name", b"email".to_vec())
            .with("data_type", b"varchar".to_vec())
            .with("column_type", b"varchar(255)".to_vec())
            .with("is_nullable", b"YES".to_vec())
            .with("column_default", b"none@example.com".to_vec())
            .with("column_key", b"UNI".to_vec())
            .with("extra", b"".to_vec());

        let column = column_from_row(&row).unwrap();
        assert_eq!(column.name, "email");
        assert_eq!(column.data_type, DataType::Varchar(255));
        assert!(column.nullable);
        assert!(!column.primary_key);
        assert_eq!(column.default.as_deref(), Some("none@example.com"));
    }

    #[test]
    fn test_column_row_missing_fields() {
        let row = Row::new().with("column_name", "id");
        assert!(matches!(
            column_from_row(&row),
            Err(Error::Query { .. })
        ));
    }

    #[tokio::test]
    async fn test_with_limit_times_out() {
        let result = with_limit(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, DriverError>(())
        })
        .await;
        assert!(matches!(result, Err(Failure::TimedOut(_))));

        let result = with_limit(None, async { Ok::<_, DriverError>(7) }).await;
        assert!(matches!(result, Ok(7)));
    }
}
