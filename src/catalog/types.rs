//! Column data types
//!
//! MySQL column types as reported by `information_schema.COLUMNS`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MySQL column type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// `TINYINT(1)` / `BOOL`
    Boolean,
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Float,
    Double,
    /// Fixed-point decimal with precision and scale
    Decimal(u8, u8),
    /// Fixed-length character string
    Char(usize),
    /// Variable-length character string with max length
    Varchar(usize),
    /// Any of the `TEXT` family
    Text,
    /// Any of the `BLOB` family, `BINARY` and `VARBINARY`
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Json,
    /// `ENUM('a', 'b', ...)`
    Enum(Vec<String>),
    /// Anything else, kept by name
    Other(String),
}

impl DataType {
    /// Map an `information_schema` `DATA_TYPE` (e.g. `varchar`) together with its
    /// `COLUMN_TYPE` (e.g. `varchar(255)`) to a [`DataType`].
    pub fn from_mysql(data_type: &str, column_type: &str) -> DataType {
        let args = type_arguments(column_type.trim());
        let column_type = column_type.trim().to_lowercase();

        match data_type.trim().to_lowercase().as_str() {
            "tinyint" if column_type.starts_with("tinyint(1)") => DataType::Boolean,
            "bool" | "boolean" => DataType::Boolean,
            "tinyint" => DataType::TinyInt,
            "smallint" => DataType::SmallInt,
            "mediumint" => DataType::MediumInt,
            "int" | "integer" => DataType::Int,
            "bigint" => DataType::BigInt,
            "float" => DataType::Float,
            "double" | "real" => DataType::Double,
            "decimal" | "numeric" => {
                let precision = args.first().and_then(|a| a.parse().ok()).unwrap_or(10);
                let scale = args.get(1).and_then(|a| a.parse().ok()).unwrap_or(0);
                DataType::Decimal(precision, scale)
            }
            "char" => DataType::Char(args.first().and_then(|a| a.parse().ok()).unwrap_or(1)),
            "varchar" => {
                DataType::Varchar(args.first().and_then(|a| a.parse().ok()).unwrap_or(255))
            }
            "tinytext" | "text" | "mediumtext" | "longtext" => DataType::Text,
            "tinyblob" | "blob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                DataType::Blob
            }
            "date" => DataType::Date,
            "time" => DataType::Time,
            "datetime" => DataType::DateTime,
            "timestamp" => DataType::Timestamp,
            "year" => DataType::Year,
            "json" => DataType::Json,
            "enum" => DataType::Enum(
                args.iter()
                    .map(|a| {
                        let inner = a.strip_prefix('\'').unwrap_or(a);
                        let inner = inner.strip_suffix('\'').unwrap_or(inner);
                        inner.replace("''", "'")
                    })
                    .collect(),
            ),
            other => DataType::Other(other.to_uppercase()),
        }
    }
}

/// Split the parenthesised arguments of a column type, honouring quotes:
/// `enum('a','b,c')` gives `["'a'", "'b,c'"]`.
fn type_arguments(column_type: &str) -> Vec<String> {
    let (Some(open), Some(close)) = (column_type.find('('), column_type.rfind(')')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for ch in column_type[open + 1..close].chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            ',' if !in_quote => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::MediumInt => write!(f, "MEDIUMINT"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Decimal(p, s) => write!(f, "DECIMAL({}, {})", p, s),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
            DataType::Text => write!(f, "TEXT"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Date => write!(f, "DATE"),
            DataType::Time => write!(f, "TIME"),
            DataType::DateTime => write!(f, "DATETIME"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Year => write!(f, "YEAR"),
            DataType::Json => write!(f, "JSON"),
            DataType::Enum(variants) => {
                let quoted: Vec<String> = variants
                    .iter()
                    .map(|v| format!("'{}'", v.replace('\'', "''")))
                    .collect();
                write!(f, "ENUM({})", quoted.join(", "))
            }
            DataType::Other(name) => write!(f, "{}", name),
        }
    }
}
