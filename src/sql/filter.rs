//! Structured WHERE-clause filters
//!
//! A [`Filter`] scopes `find`, `update` and `delete`. It compiles to a SQL
//! fragment in which every value is a `?` placeholder, so caller data never
//! becomes SQL text.

use std::fmt;
use std::str::FromStr;

use super::parser::FilterParser;
use super::statement::quote_identifier;
use crate::error::{Error, Result};
use crate::row::Value;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A condition on the columns of one table
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column op value`
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// `column IS [NOT] NULL`
    IsNull { column: String, negated: bool },
    /// `column [NOT] IN (values...)`
    InList {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column [NOT] LIKE pattern`
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    /// `column [NOT] BETWEEN low AND high`
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// All conditions hold
    And(Vec<Filter>),
    /// At least one condition holds
    Or(Vec<Filter>),
    /// The condition does not hold
    Not(Box<Filter>),
}

impl Filter {
    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`; a NULL value means `IS NULL`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column <> value`; a NULL value means `IS NOT NULL`
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Filter::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::InList {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like {
            column: column.into(),
            pattern: pattern.into(),
            negated: true,
        }
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Filter::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        }
    }

    /// Conjunction of all given filters
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// Disjunction of all given filters
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// `self AND other`, flattening nested conjunctions
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, Filter::And(mut right)) => {
                right.insert(0, this);
                Filter::And(right)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    /// `self OR other`, flattening nested disjunctions
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), other) => {
                left.push(other);
                Filter::Or(left)
            }
            (this, Filter::Or(mut right)) => {
                right.insert(0, this);
                Filter::Or(right)
            }
            (this, other) => Filter::Or(vec![this, other]),
        }
    }

    /// `NOT self`
    pub fn negate(self) -> Self {
        match self {
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }

    /// Parse a predicate string such as `name = 'Alice' AND age > 30`.
    ///
    /// Only `column operator literal` comparisons combined with
    /// `AND`/`OR`/`NOT` and parentheses are accepted, plus `IS [NOT] NULL`,
    /// `[NOT] IN (...)`, `[NOT] LIKE` and `[NOT] BETWEEN ... AND ...`.
    /// Literals end up as bound parameters like any other filter value.
    pub fn parse(predicate: &str) -> Result<Self> {
        FilterParser::new(predicate)?.parse()
    }

    /// Every column this filter references, in order of appearance
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Compare { column, .. }
            | Filter::IsNull { column, .. }
            | Filter::InList { column, .. }
            | Filter::Like { column, .. }
            | Filter::Between { column, .. } => out.push(column),
            Filter::And(filters) | Filter::Or(filters) => {
                for filter in filters {
                    filter.collect_columns(out);
                }
            }
            Filter::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Compile to a SQL fragment with `?` placeholders and its parameters
    pub fn compile(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.write_sql(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    pub(crate) fn write_sql(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<()> {
        match self {
            Filter::Compare { column, op, value } => {
                let column = quote_identifier(column)?;
                if value.is_null() {
                    match op {
                        CompareOp::Eq => sql.push_str(&format!("{} IS NULL", column)),
                        CompareOp::Ne => sql.push_str(&format!("{} IS NOT NULL", column)),
                        _ => {
                            return Err(Error::InvalidFilter(format!(
                                "cannot compare {} with NULL using {}",
                                column, op
                            )))
                        }
                    }
                } else {
                    sql.push_str(&format!("{} {} ?", column, op));
                    params.push(value.clone());
                }
            }
            Filter::IsNull { column, negated } => {
                let not = if *negated { " NOT" } else { "" };
                sql.push_str(&format!("{} IS{} NULL", quote_identifier(column)?, not));
            }
            Filter::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Err(Error::InvalidFilter(format!(
                        "IN list for column '{}' is empty",
                        column
                    )));
                }
                let not = if *negated { " NOT" } else { "" };
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!(
                    "{}{} IN ({})",
                    quote_identifier(column)?,
                    not,
                    placeholders
                ));
                params.extend(values.iter().cloned());
            }
            Filter::Like {
                column,
                pattern,
                negated,
            } => {
                let not = if *negated { " NOT" } else { "" };
                sql.push_str(&format!("{}{} LIKE ?", quote_identifier(column)?, not));
                params.push(Value::Text(pattern.clone()));
            }
            Filter::Between {
                column,
                low,
                high,
                negated,
            } => {
                if low.is_null() || high.is_null() {
                    return Err(Error::InvalidFilter(format!(
                        "BETWEEN bounds for column '{}' cannot be NULL",
                        column
                    )));
                }
                let not = if *negated { " NOT" } else { "" };
                sql.push_str(&format!(
                    "{}{} BETWEEN ? AND ?",
                    quote_identifier(column)?,
                    not
                ));
                params.push(low.clone());
                params.push(high.clone());
            }
            Filter::And(filters) => write_group(filters, "AND", sql, params)?,
            Filter::Or(filters) => write_group(filters, "OR", sql, params)?,
            Filter::Not(inner) => {
                sql.push_str("NOT (");
                inner.write_sql(sql, params)?;
                sql.push(')');
            }
        }
        Ok(())
    }
}

fn write_group(
    filters: &[Filter],
    joiner: &str,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<()> {
    match filters {
        [] => Err(Error::InvalidFilter(format!("empty {} group", joiner))),
        [only] => only.write_sql(sql, params),
        _ => {
            sql.push('(');
            for (i, filter) in filters.iter().enumerate() {
                if i > 0 {
                    sql.push_str(&format!(" {} ", joiner));
                }
                filter.write_sql(sql, params)?;
            }
            sql.push(')');
            Ok(())
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Filter::parse(s)
    }
}

impl TryFrom<&str> for Filter {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Filter::parse(s)
    }
}
