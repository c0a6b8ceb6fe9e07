//! SQL Server type mappings.
//!
//! This module provides utilities for mapping between SQL Server types and our
//! portable type descriptors, plus the conversion of driver rows into JSON
//! records.
//!
//! # Architecture
//!
//! Type mapping uses a two-phase approach:
//! 1. `VendorType::from_name` classifies a vendor type name into a closed set
//! 2. `VendorType::describe` renders the portable descriptor for a given size,
//!    precision and scale
//!
//! `supports` and `map_type` are both driven by the same enum, so they cannot
//! disagree about which names are valid.

use std::borrow::Cow;

use serde_json::Value as JsonValue;
use tiberius::{ColumnData, FromSql, Row};

use crate::error::{DbError, DbResult};
use crate::models::{Record, SemanticType, TypeDescriptor};

// =============================================================================
// Type Classification
// =============================================================================

/// SQL Server types that can be mapped to a portable descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VendorType {
    // Exact numerics
    BigInt,
    Bit,
    Decimal,
    Int,
    Money,
    Numeric,
    SmallInt,
    SmallMoney,
    TinyInt,
    // Approximate numerics
    Float,
    Real,
    // Date and time
    Date,
    DateTime2,
    DateTime,
    DateTimeOffset,
    SmallDateTime,
    Time,
    // Character strings
    Char,
    VarChar,
    // Unicode character strings
    NChar,
    NVarChar,
    // Binary strings
    Binary,
    VarBinary,
    // Other
    UniqueIdentifier,
}

/// Size sentinel SQL Server reports for `(max)` columns.
pub const MAX_SIZE: i32 = -1;

impl VendorType {
    /// Classify a vendor type name. Lookup is case-insensitive and ignores
    /// surrounding whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        let ty = match lower.as_str() {
            "bigint" => Self::BigInt,
            "bit" => Self::Bit,
            "decimal" => Self::Decimal,
            "int" => Self::Int,
            "money" => Self::Money,
            "numeric" => Self::Numeric,
            "smallint" => Self::SmallInt,
            "smallmoney" => Self::SmallMoney,
            "tinyint" => Self::TinyInt,
            "float" => Self::Float,
            "real" => Self::Real,
            "date" => Self::Date,
            "datetime2" => Self::DateTime2,
            "datetime" => Self::DateTime,
            "datetimeoffset" => Self::DateTimeOffset,
            "smalldatetime" => Self::SmallDateTime,
            "time" => Self::Time,
            "char" => Self::Char,
            "varchar" => Self::VarChar,
            "nchar" => Self::NChar,
            "nvarchar" => Self::NVarChar,
            "binary" => Self::Binary,
            "varbinary" => Self::VarBinary,
            "uniqueidentifier" => Self::UniqueIdentifier,
            _ => return None,
        };
        Some(ty)
    }

    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Self::Bit => SemanticType::Boolean,
            Self::BigInt
            | Self::Decimal
            | Self::Int
            | Self::Money
            | Self::Numeric
            | Self::SmallInt
            | Self::SmallMoney
            | Self::TinyInt
            | Self::Float
            | Self::Real
            // Preserved as number; the emitter relies on it.
            | Self::DateTimeOffset => SemanticType::Number,
            Self::Date
            | Self::DateTime2
            | Self::DateTime
            | Self::SmallDateTime
            | Self::Time => SemanticType::Date,
            Self::Char
            | Self::VarChar
            | Self::NChar
            | Self::NVarChar
            | Self::UniqueIdentifier => SemanticType::String,
            Self::Binary | Self::VarBinary => SemanticType::Binary,
        }
    }

    /// Build the portable descriptor for this type.
    pub fn describe(&self, size: i32, precision: i32, scale: i32) -> TypeDescriptor {
        let (wire, display) = match self {
            Self::BigInt => fixed("BigInt", "bigint"),
            Self::Bit => fixed("Bit", "bit"),
            Self::Int => fixed("Int", "int"),
            Self::Money => fixed("Money", "money"),
            Self::SmallInt => fixed("SmallInt", "smallint"),
            Self::SmallMoney => fixed("SmallMoney", "smallmoney"),
            Self::TinyInt => fixed("TinyInt", "tinyint"),
            Self::Decimal => (
                format!("Decimal({}, {})", precision, scale),
                format!("decimal({}, {})", precision, scale),
            ),
            Self::Numeric => (
                format!("Numeric({}, {})", precision, scale),
                format!("numeric({}, {})", precision, scale),
            ),
            Self::Float => {
                let size = TypeSize::plain(size);
                ("Float()".to_string(), format!("float({})", size.display))
            }
            Self::Real => {
                let size = TypeSize::plain(size);
                ("Real()".to_string(), format!("real({})", size.display))
            }
            Self::Date => fixed("Date", "date"),
            Self::DateTime2 => fixed("DateTime2", "datetime2"),
            Self::DateTime => fixed("DateTime", "datetime"),
            Self::SmallDateTime => fixed("SmallDateTime", "smalldatetime"),
            Self::DateTimeOffset => (
                format!("DateTimeOffset({})", scale),
                format!("datetimeoffset({})", scale),
            ),
            Self::Time => (format!("Time({})", scale), format!("time({})", scale)),
            Self::Char => sized("Char", "char", TypeSize::plain(size)),
            Self::VarChar => sized("VarChar", "varchar", TypeSize::plain(size)),
            Self::NChar => sized("NChar", "nchar", TypeSize::unicode(size)),
            Self::NVarChar => sized("NVarChar", "nvarchar", TypeSize::unicode(size)),
            Self::Binary => {
                let size = TypeSize::plain(size);
                ("Binary()".to_string(), format!("binary({})", size.display))
            }
            Self::VarBinary => sized("VarBinary", "varbinary", TypeSize::plain(size)),
            Self::UniqueIdentifier => fixed("UniqueIdentifier", "uniqueidentifier"),
        };
        TypeDescriptor::new(self.semantic_type(), wire, display)
    }
}

fn fixed(wire: &str, display: &str) -> (String, String) {
    (format!("{}()", wire), display.to_string())
}

fn sized(wire: &str, display: &str, size: TypeSize) -> (String, String) {
    (
        format!("{}({})", wire, size.wire),
        format!("{}({})", display, size.display),
    )
}

/// Rendered length of a sized type, for the wire and display forms.
struct TypeSize {
    wire: String,
    display: String,
}

impl TypeSize {
    fn max() -> Self {
        Self {
            wire: String::new(),
            display: "max".to_string(),
        }
    }

    fn plain(size: i32) -> Self {
        if size == MAX_SIZE {
            return Self::max();
        }
        Self {
            wire: size.to_string(),
            display: size.to_string(),
        }
    }

    /// `nchar`/`nvarchar` sizes are reported in bytes; the declared length
    /// counts byte pairs.
    fn unicode(size: i32) -> Self {
        if size == MAX_SIZE {
            return Self::max();
        }
        // Integer division: an odd byte count truncates
        Self::plain(size / 2)
    }
}

/// Whether a vendor type name can be mapped.
pub fn supports(type_name: &str) -> bool {
    VendorType::from_name(type_name).is_some()
}

/// Map a vendor type to its portable descriptor.
pub fn map_type(type_name: &str, size: i32, precision: i32, scale: i32) -> DbResult<TypeDescriptor> {
    VendorType::from_name(type_name)
        .map(|ty| ty.describe(size, precision, scale))
        .ok_or_else(|| DbError::unsupported_type(type_name, size, precision, scale))
}

/// Lowercase a reported column type and drop its parenthesized suffix,
/// e.g. `NVARCHAR(100)` becomes `nvarchar`.
pub fn clean_type_name(type_name: &str) -> String {
    let lower = type_name.trim().to_lowercase();
    match (lower.find('('), lower.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            format!("{}{}", &lower[..open], &lower[close + 1..])
        }
        _ => lower,
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary data as a base64 JSON string.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Record;
}

impl RowToJson for Row {
    fn to_json_map(&self) -> Record {
        self.cells()
            .map(|(column, data)| (column.name().to_string(), decode_column(data)))
            .collect()
    }
}

/// Convert one driver cell to JSON. Decimals keep their exact text
/// representation; date and time values are rendered in ISO 8601.
pub fn decode_column(data: &ColumnData<'static>) -> JsonValue {
    match data {
        ColumnData::U8(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::I16(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::I32(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::I64(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        ColumnData::F32(v) => v.map(|f| float_value(f as f64)).unwrap_or(JsonValue::Null),
        ColumnData::F64(v) => v.map(float_value).unwrap_or(JsonValue::Null),
        ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Guid(v) => v
            .map(|g| JsonValue::String(g.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| decode_binary_value(b))
            .unwrap_or(JsonValue::Null),
        ColumnData::Numeric(v) => v
            .map(|n| JsonValue::String(n.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| JsonValue::String(Cow::clone(x).into_owned().into_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<chrono::NaiveDateTime>(data)
        }
        ColumnData::Date(_) => temporal::<chrono::NaiveDate>(data),
        ColumnData::Time(_) => temporal::<chrono::NaiveTime>(data),
        ColumnData::DateTimeOffset(_) => temporal::<chrono::DateTime<chrono::FixedOffset>>(data),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn temporal<'a, T>(data: &'a ColumnData<'static>) -> JsonValue
where
    T: FromSql<'a> + ToString,
{
    match T::from_sql(data) {
        Ok(Some(v)) => JsonValue::String(v.to_string()),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::error!("Failed to decode temporal value: {:?}", e);
            JsonValue::Null
        }
    }
}
