//! MySQL driver
//!
//! Implements the connection seam on top of a single `sqlx` [`MySqlConnection`].
//! Parameters are bound per [`Value`] variant and result columns are decoded by
//! their reported MySQL type.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::error::ErrorKind as SqlxErrorKind;
use sqlx::mysql::{
    MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlQueryResult, MySqlRow,
};
use sqlx::query::Query;
use sqlx::{Column as _, Connection as _, MySql, Row as _, TypeInfo as _, ValueRef as _};

use super::connection::{Connection, Connector, DriverError, ExecOutcome};
use crate::config::ConnectionConfig;
use crate::error::ConstraintKind;
use crate::row::{Row, Value};
use crate::sql::Statement;

/// Opens connections to a MySQL or MariaDB server
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>, DriverError> {
        let mut options = MySqlConnectOptions::new()
            .host(config.host())
            .port(config.port())
            .username(config.username())
            .database(config.database());
        if !config.password().is_empty() {
            options = options.password(config.password().expose());
        }
        if let Some(charset) = config.charset() {
            options = options.charset(charset);
        }

        let conn = MySqlConnection::connect_with(&options).await?;
        Ok(Box::new(MySqlHandle { conn }))
    }
}

/// An open MySQL connection
pub struct MySqlHandle {
    conn: MySqlConnection,
}

#[async_trait]
impl Connection for MySqlHandle {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, DriverError> {
        let rows = bind(statement).fetch_all(&mut self.conn).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, DriverError> {
        let result = bind(statement).execute(&mut self.conn).await?;
        Ok(outcome(&result))
    }

    async fn execute_batch(
        &mut self,
        statements: &[Statement],
    ) -> Result<ExecOutcome, DriverError> {
        // Dropping the transaction on error rolls it back
        let mut tx = self.conn.begin().await?;
        let mut total = ExecOutcome::default();

        for statement in statements {
            let result = bind(statement).execute(&mut *tx).await?;
            let step = outcome(&result);
            total.rows_affected += step.rows_affected;
            total.last_insert_id = total.last_insert_id.or(step.last_insert_id);
        }

        tx.commit().await?;
        Ok(total)
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        self.conn.ping().await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.close().await?;
        Ok(())
    }
}

fn outcome(result: &MySqlQueryResult) -> ExecOutcome {
    let id = result.last_insert_id();
    ExecOutcome {
        rows_affected: result.rows_affected(),
        last_insert_id: (id > 0).then_some(id),
    }
}

fn bind(statement: &Statement) -> Query<'_, MySql, MySqlArguments> {
    statement
        .params()
        .iter()
        .fold(sqlx::query(statement.sql()), |query, value| match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bytes(v) => query.bind(v.as_slice()),
            Value::Date(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        })
}

fn decode_row(row: &MySqlRow) -> Result<Row, DriverError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name())?;
        decoded.set(column.name(), value);
    }
    Ok(decoded)
}

fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, DriverError> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::Int(row.try_get_unchecked::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            let n = row.try_get_unchecked::<u64, _>(index)?;
            // Out-of-range BIGINT UNSIGNED values keep their digits as text
            i64::try_from(n)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(n.to_string()))
        }
        "FLOAT" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => Value::Float(row.try_get::<f64, _>(index)?),
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            Value::Text(row.try_get_unchecked::<String, _>(index)?)
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?)
        }
        "DATE" => Value::Date(row.try_get::<NaiveDate, _>(index)?),
        "DATETIME" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(index)?),
        "TIMESTAMP" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?.naive_utc()),
        "TIME" => Value::Text(row.try_get::<NaiveTime, _>(index)?.to_string()),
        // DECIMAL and JSON arrive as text; anything unrecognised falls back to bytes
        _ => match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        },
    };

    Ok(value)
}

impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let kind = match db.kind() {
                    SqlxErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                    SqlxErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                    SqlxErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                    SqlxErrorKind::CheckViolation => Some(ConstraintKind::Check),
                    _ => None,
                };
                match kind {
                    Some(kind) => DriverError::Constraint {
                        kind,
                        message: db.message().to_string(),
                    },
                    None => DriverError::Rejected(db.to_string()),
                }
            }
            sqlx::Error::Io(e) => DriverError::Disconnected(e.to_string()),
            sqlx::Error::Tls(e) => DriverError::Disconnected(e.to_string()),
            sqlx::Error::Protocol(message) => DriverError::Disconnected(message),
            other => DriverError::Other(other.to_string()),
        }
    }
}
