//! Parameter definitions and binding for SQL Server requests.
//!
//! A [`Parameter`] pairs a name and value with the T-SQL type it is declared
//! as. The declared type is what the server sees; the driver-level binding is
//! only a transport and is converted on the server side.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SqlValue;

/// Declared T-SQL type of a bound parameter. A length of `None` means `MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    Float,
    Real,
    Decimal(u8, u8),
    Char(Option<u16>),
    VarChar(Option<u16>),
    NChar(Option<u16>),
    NVarChar(Option<u16>),
    Binary(Option<u16>),
    VarBinary(Option<u16>),
    UniqueIdentifier,
    Date,
    DateTime,
    DateTime2,
}

impl SqlType {
    /// T-SQL declaration text, e.g. `VARCHAR(255)` or `NVARCHAR(MAX)`.
    pub fn declaration(&self) -> String {
        fn len(name: &str, length: &Option<u16>) -> String {
            match length {
                Some(n) => format!("{}({})", name, n),
                None => format!("{}(MAX)", name),
            }
        }

        match self {
            Self::BigInt => "BIGINT".to_string(),
            Self::Int => "INT".to_string(),
            Self::SmallInt => "SMALLINT".to_string(),
            Self::TinyInt => "TINYINT".to_string(),
            Self::Bit => "BIT".to_string(),
            Self::Float => "FLOAT".to_string(),
            Self::Real => "REAL".to_string(),
            Self::Decimal(p, s) => format!("DECIMAL({}, {})", p, s),
            Self::Char(n) => len("CHAR", n),
            Self::VarChar(n) => len("VARCHAR", n),
            Self::NChar(n) => len("NCHAR", n),
            Self::NVarChar(n) => len("NVARCHAR", n),
            Self::Binary(n) => len("BINARY", n),
            Self::VarBinary(n) => len("VARBINARY", n),
            Self::UniqueIdentifier => "UNIQUEIDENTIFIER".to_string(),
            Self::Date => "DATE".to_string(),
            Self::DateTime => "DATETIME".to_string(),
            Self::DateTime2 => "DATETIME2".to_string(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}

/// A named, typed value bound to a statement or routine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: SqlValue,
    pub sql_type: SqlType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<SqlValue>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            sql_type,
        }
    }

    /// Name without a leading `@`, as used in declarations.
    pub fn bare_name(&self) -> &str {
        self.name.trim_start_matches('@')
    }
}

/// Bind a parameter to a SQL Server query.
pub(crate) fn bind_mssql_param<'a>(query: &mut tiberius::Query<'a>, param: &Parameter) {
    match &param.value {
        SqlValue::Null => bind_mssql_null(query, param.sql_type),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::String(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
    }
}

/// NULL values are still bound with a type the server can convert from.
fn bind_mssql_null(query: &mut tiberius::Query<'_>, sql_type: SqlType) {
    match sql_type {
        SqlType::BigInt | SqlType::Int | SqlType::SmallInt | SqlType::TinyInt => {
            query.bind(None::<i64>)
        }
        SqlType::Bit => query.bind(None::<bool>),
        SqlType::Float | SqlType::Real | SqlType::Decimal(..) => query.bind(None::<f64>),
        SqlType::Binary(_) | SqlType::VarBinary(_) => query.bind(None::<Vec<u8>>),
        SqlType::UniqueIdentifier => query.bind(None::<Uuid>),
        SqlType::Char(_)
        | SqlType::VarChar(_)
        | SqlType::NChar(_)
        | SqlType::NVarChar(_)
        | SqlType::Date
        | SqlType::DateTime
        | SqlType::DateTime2 => query.bind(None::<String>),
    }
}
