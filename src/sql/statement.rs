//! Parameterized statements
//!
//! Builders for the SELECT, INSERT, UPDATE and DELETE statements the gateway
//! issues. Identifiers are backtick-quoted and every value is a `?` parameter.

use std::fmt;

use super::filter::Filter;
use crate::error::{Error, Result};
use crate::row::{Row, Value};

/// Most placeholders MySQL accepts in one prepared statement
pub const MAX_PLACEHOLDERS: usize = 65_535;

/// SQL text plus the values bound to its placeholders, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// A statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with parameters for its `?` placeholders
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// `SELECT cols FROM table [WHERE filter]`; no columns selects `*`
    pub fn select(table: &str, columns: &[&str], filter: Option<&Filter>) -> Result<Self> {
        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            quote_list(columns.iter().copied())?
        };

        let mut sql = format!("SELECT {} FROM {}", projection, quote_table(table)?);
        let mut params = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            filter.write_sql(&mut sql, &mut params)?;
        }

        Ok(Self { sql, params })
    }

    /// `INSERT INTO table (cols) VALUES (?, ...)`
    pub fn insert(table: &str, row: &Row) -> Result<Self> {
        if row.is_empty() {
            return Err(Error::EmptyRow(table.to_string()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_table(table)?,
            quote_list(row.columns())?,
            placeholder_group(row.len())
        );

        Ok(Self {
            sql,
            params: row.values().cloned().collect(),
        })
    }

    /// Multi-row inserts, split so that no statement exceeds
    /// [`MAX_PLACEHOLDERS`]. Every row must have the columns of the first,
    /// in the same order.
    pub fn insert_many(table: &str, rows: &[Row]) -> Result<Vec<Self>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        if first.is_empty() {
            return Err(Error::EmptyRow(table.to_string()));
        }
        if rows.iter().any(|row| !row.same_shape(first)) {
            return Err(Error::RowShapeMismatch(table.to_string()));
        }

        let width = first.len();
        let head = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_table(table)?,
            quote_list(first.columns())?
        );
        let group = placeholder_group(width);
        let rows_per_statement = (MAX_PLACEHOLDERS / width).max(1);

        let statements = rows
            .chunks(rows_per_statement)
            .map(|chunk| {
                let mut sql = head.clone();
                sql.push_str(&vec![group.as_str(); chunk.len()].join(", "));
                let params = chunk
                    .iter()
                    .flat_map(|row| row.values().cloned())
                    .collect();
                Self { sql, params }
            })
            .collect();

        Ok(statements)
    }

    /// `UPDATE table SET col = ?, ... WHERE filter`
    pub fn update(table: &str, changes: &Row, filter: &Filter) -> Result<Self> {
        if changes.is_empty() {
            return Err(Error::EmptyRow(table.to_string()));
        }

        let assignments = changes
            .columns()
            .map(|column| Ok(format!("{} = ?", quote_identifier(column)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!(
            "UPDATE {} SET {} WHERE ",
            quote_table(table)?,
            assignments.join(", ")
        );
        let mut params: Vec<Value> = changes.values().cloned().collect();
        filter.write_sql(&mut sql, &mut params)?;

        Ok(Self { sql, params })
    }

    /// `DELETE FROM table WHERE filter`
    pub fn delete(table: &str, filter: &Filter) -> Result<Self> {
        let mut sql = format!("DELETE FROM {} WHERE ", quote_table(table)?);
        let mut params = Vec::new();
        filter.write_sql(&mut sql, &mut params)?;

        Ok(Self { sql, params })
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Quote a column or table name with backticks
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a table name, which may be qualified as `database.table`
pub fn quote_table(name: &str) -> Result<String> {
    match name.split_once('.') {
        Some((database, table)) => Ok(format!(
            "{}.{}",
            quote_identifier(database)?,
            quote_identifier(table)?
        )),
        None => quote_identifier(name),
    }
}

fn quote_list<'a>(names: impl Iterator<Item = &'a str>) -> Result<String> {
    let quoted = names.map(quote_identifier).collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

fn placeholder_group(width: usize) -> String {
    format!("({})", vec!["?"; width].join(", "))
}
