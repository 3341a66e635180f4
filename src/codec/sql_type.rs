use crate::codec::Codec;
use crate::codec::value::Value;

/// Generic SQL type named by a caller when binding a typed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Char,
    Varchar,
    NChar,
    NVarchar,
    Clob,
    NClob,
    Boolean,
    Binary,
    Varbinary,
    Blob,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Numeric,
    Decimal,
    Float,
    Real,
    Double,
    Date,
    Time,
    TimeWithTimeZone,
    Timestamp,
    TimestampWithTimeZone,
}

impl SqlType {
    /// Codec that carries this type's wire metadata
    pub fn codec(self) -> Codec {
        match self {
            SqlType::Char
            | SqlType::Varchar
            | SqlType::NChar
            | SqlType::NVarchar
            | SqlType::Clob
            | SqlType::NClob => Codec::String,
            SqlType::Boolean => Codec::Bool,
            SqlType::TinyInt => Codec::Byte,
            SqlType::Binary | SqlType::Varbinary | SqlType::Blob => Codec::Bytes,
            SqlType::SmallInt => Codec::Short,
            SqlType::Integer => Codec::Int,
            SqlType::BigInt => Codec::BigInt,
            SqlType::Numeric | SqlType::Decimal => Codec::Decimal,
            SqlType::Float | SqlType::Real => Codec::Float,
            SqlType::Double => Codec::Double,
            SqlType::Date => Codec::Date,
            SqlType::Time | SqlType::TimeWithTimeZone => Codec::Time,
            SqlType::Timestamp | SqlType::TimestampWithTimeZone => Codec::DateTime,
        }
    }
}

/// A bind value optionally tagged with the SQL type it should be sent as.
///
/// The type only matters for NULL: a typed NULL is sent with that type's wire metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub value: Value,
    pub sql_type: Option<SqlType>,
}

impl Parameter {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            sql_type: None,
        }
    }

    pub fn typed(value: impl Into<Value>, sql_type: SqlType) -> Self {
        Self {
            value: value.into(),
            sql_type: Some(sql_type),
        }
    }

    pub fn null(sql_type: SqlType) -> Self {
        Self::typed(Value::Null, sql_type)
    }
}
