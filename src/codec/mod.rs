//! Codec registry.
//!
//! A closed, ordered list of codecs converts between column bytes and [`Value`]s in both the
//! text and binary protocols. Decoding picks the first codec that accepts the column's wire
//! type and the requested [`HostType`]; `HostType::Any` uses the column's natural mapping
//! instead. Encoding picks a codec by the bound value's host type.

pub(crate) mod numeric;
mod sql_type;
pub(crate) mod string;
pub mod temporal;
mod value;

use std::sync::Arc;

pub use sql_type::{Parameter, SqlType};
pub use value::{BitSet, FromValue, HostType, Value};

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::constant::ColumnType;
use crate::error::{Error, Result, eyre};
use crate::protocol::column_definition::ColumnDefinition;
use crate::protocol::primitive::{write_bytes_lenenc, write_string_lenenc};

/// Row encoding of a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// COM_QUERY results: every value is a length-encoded string
    Text,
    /// COM_STMT_EXECUTE results: NULL bitmap and typed binary values
    Binary,
}

/// Settings consulted while decoding a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    pub protocol: Protocol,
    /// `TINYINT(1)` decodes naturally as `bool`
    pub tiny_int1_is_bool: bool,
}

impl DecodeContext {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            tiny_int1_is_bool: true,
        }
    }
}

/// Settings consulted while encoding a parameter
#[derive(Debug, Clone)]
pub struct EncodeContext {
    /// The server runs with `NO_BACKSLASH_ESCAPES`, so quotes are doubled instead
    pub no_backslash_escapes: bool,
    pub buffer_pool: Arc<BufferPool>,
}

impl Default for EncodeContext {
    fn default() -> Self {
        Self {
            no_backslash_escapes: false,
            buffer_pool: Arc::clone(&GLOBAL_BUFFER_POOL),
        }
    }
}

/// A bound parameter ready to be written.
///
/// `bytes` is `None` for NULL. An empty `Some` is a zero-length value. Binary-protocol bytes
/// are the exact COM_STMT_EXECUTE value including any length prefix. Text-protocol bytes are
/// an SQL literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindValue {
    pub codec: Codec,
    pub bytes: Option<Vec<u8>>,
}

impl BindValue {
    pub fn null(codec: Codec) -> Self {
        Self { codec, bytes: None }
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    /// Parameter type sent in the COM_STMT_EXECUTE type header
    pub fn column_type(&self) -> ColumnType {
        self.codec.column_type()
    }
}

/// One entry of the codec list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Decimal,
    BigInt,
    Bool,
    Bytes,
    Byte,
    BitSet,
    Double,
    Long,
    Float,
    Int,
    Date,
    DateTime,
    Time,
    Duration,
    Short,
    Stream,
    String,
}

/// Priority order. The first codec that accepts a request wins.
pub const CODECS: [Codec; 17] = [
    Codec::Decimal,
    Codec::BigInt,
    Codec::Bool,
    Codec::Bytes,
    Codec::Byte,
    Codec::BitSet,
    Codec::Double,
    Codec::Long,
    Codec::Float,
    Codec::Int,
    Codec::Date,
    Codec::DateTime,
    Codec::Time,
    Codec::Duration,
    Codec::Short,
    Codec::Stream,
    Codec::String,
];

impl Codec {
    /// Host types this codec produces and accepts
    pub fn host_types(self) -> &'static [HostType] {
        match self {
            Codec::Decimal => &[HostType::Decimal],
            Codec::BigInt => &[HostType::I128, HostType::U64],
            Codec::Bool => &[HostType::Bool],
            Codec::Bytes => &[HostType::Bytes],
            Codec::Byte => &[HostType::I8],
            Codec::BitSet => &[HostType::BitSet],
            Codec::Double => &[HostType::F64],
            Codec::Long => &[HostType::I64, HostType::U32],
            Codec::Float => &[HostType::F32],
            Codec::Int => &[HostType::I32, HostType::U16],
            Codec::Date => &[HostType::Date],
            Codec::DateTime => &[HostType::DateTime],
            Codec::Time => &[HostType::Time],
            Codec::Duration => &[HostType::Duration],
            Codec::Short => &[HostType::I16, HostType::U8],
            Codec::Stream => &[HostType::Stream],
            Codec::String => &[HostType::String],
        }
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            Codec::Decimal
                | Codec::BigInt
                | Codec::Bool
                | Codec::Byte
                | Codec::Double
                | Codec::Long
                | Codec::Float
                | Codec::Int
                | Codec::Short
        )
    }

    fn is_temporal(self) -> bool {
        matches!(
            self,
            Codec::Date | Codec::DateTime | Codec::Time | Codec::Duration
        )
    }

    /// Wire types this codec can read
    pub fn accepts_column(self, ty: ColumnType) -> bool {
        match self {
            _ if self.is_numeric() => ty.is_numeric() || ty.is_string() || ty.is_blob(),
            Codec::Bytes => {
                ty.is_string()
                    || ty.is_blob()
                    || ty == ColumnType::MYSQL_TYPE_BIT
                    || ty == ColumnType::MYSQL_TYPE_GEOMETRY
            }
            Codec::BitSet => ty == ColumnType::MYSQL_TYPE_BIT,
            Codec::Date => ty.is_date() || ty.is_datetime() || ty.is_string(),
            Codec::DateTime => ty.is_date() || ty.is_datetime() || ty.is_time() || ty.is_string(),
            Codec::Time | Codec::Duration => ty.is_time() || ty.is_datetime() || ty.is_string(),
            Codec::Stream => ty.is_blob() || ty.is_string() || ty == ColumnType::MYSQL_TYPE_GEOMETRY,
            _ => ty != ColumnType::MYSQL_TYPE_GEOMETRY,
        }
    }

    pub fn can_decode(self, column: &ColumnDefinition, host: HostType) -> bool {
        self.host_types().contains(&host) && self.accepts_column(column.column_type)
    }

    /// Streams are decode-only
    pub fn can_encode(self, host: HostType) -> bool {
        self != Codec::Stream && self.host_types().contains(&host)
    }

    fn exact(host: HostType) -> Option<Codec> {
        Some(match host {
            HostType::Decimal => Codec::Decimal,
            HostType::I128 => Codec::BigInt,
            HostType::Bool => Codec::Bool,
            HostType::Bytes => Codec::Bytes,
            HostType::BitSet => Codec::BitSet,
            HostType::F64 => Codec::Double,
            HostType::I64 => Codec::Long,
            HostType::F32 => Codec::Float,
            HostType::I32 => Codec::Int,
            HostType::Date => Codec::Date,
            HostType::DateTime => Codec::DateTime,
            HostType::Time => Codec::Time,
            HostType::Duration => Codec::Duration,
            HostType::I16 => Codec::Short,
            HostType::Stream => Codec::Stream,
            HostType::String => Codec::String,
            _ => return None,
        })
    }

    /// Exact mapping first, then the priority list
    pub fn for_host(host: HostType) -> Option<Codec> {
        Self::exact(host).or_else(|| {
            CODECS
                .iter()
                .copied()
                .find(|codec| codec.host_types().contains(&host))
        })
    }

    /// Parameter type sent for values bound through this codec
    pub fn column_type(self) -> ColumnType {
        match self {
            Codec::Decimal | Codec::BigInt => ColumnType::MYSQL_TYPE_NEWDECIMAL,
            Codec::Bool | Codec::Byte => ColumnType::MYSQL_TYPE_TINY,
            Codec::Short => ColumnType::MYSQL_TYPE_SHORT,
            Codec::Int => ColumnType::MYSQL_TYPE_LONG,
            Codec::Long => ColumnType::MYSQL_TYPE_LONGLONG,
            Codec::Float => ColumnType::MYSQL_TYPE_FLOAT,
            Codec::Double => ColumnType::MYSQL_TYPE_DOUBLE,
            Codec::Date => ColumnType::MYSQL_TYPE_DATE,
            Codec::DateTime => ColumnType::MYSQL_TYPE_DATETIME,
            Codec::Time | Codec::Duration => ColumnType::MYSQL_TYPE_TIME,
            Codec::Bytes | Codec::BitSet | Codec::Stream => ColumnType::MYSQL_TYPE_BLOB,
            Codec::String => ColumnType::MYSQL_TYPE_VAR_STRING,
        }
    }

    fn decode_in(
        self,
        protocol: Protocol,
        column: &ColumnDefinition,
        host: HostType,
        bytes: &[u8],
    ) -> Result<Value> {
        match self {
            _ if self.is_numeric() => numeric::parse(column, protocol, bytes)?.into_host(host),
            Codec::Bytes => Ok(string::decode_bytes(bytes)),
            Codec::BitSet => Ok(string::decode_bitset(bytes)),
            Codec::Stream => Ok(string::decode_stream(bytes)),
            Codec::String => string::decode_string(column, protocol, bytes),
            Codec::Date => temporal::decode_date(column, protocol, bytes),
            Codec::DateTime => temporal::decode_datetime(column, protocol, bytes),
            Codec::Time => temporal::decode_time(column, protocol, bytes),
            _ => temporal::decode_duration(column, protocol, bytes),
        }
    }

    pub fn decode_text(self, column: &ColumnDefinition, host: HostType, bytes: &[u8]) -> Result<Value> {
        self.decode_in(Protocol::Text, column, host, bytes)
    }

    pub fn decode_binary(
        self,
        column: &ColumnDefinition,
        host: HostType,
        bytes: &[u8],
    ) -> Result<Value> {
        self.decode_in(Protocol::Binary, column, host, bytes)
    }

    /// Append an SQL literal for `value`
    pub fn encode_text(self, value: &Value, ctx: &EncodeContext, out: &mut Vec<u8>) -> Result<()> {
        match (self, value) {
            (codec, _) if codec.is_numeric() => numeric::encode_text(value, out),
            (codec, _) if codec.is_temporal() => temporal::encode_text(value, out),
            (Codec::String, Value::String(s)) => {
                string::encode_string_text(s, ctx, out);
                Ok(())
            }
            (Codec::Bytes, Value::Bytes(b)) => {
                string::encode_bytes_text(b, ctx, out);
                Ok(())
            }
            (Codec::BitSet, Value::BitSet(bits)) => {
                string::encode_bitset_text(bits, out);
                Ok(())
            }
            (codec, value) => Err(mismatch(codec, value)),
        }
    }

    /// Append the binary protocol value for `value`
    pub fn encode_binary(self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match (self, value) {
            (codec, _) if codec.is_numeric() => numeric::encode_binary(codec, value, out),
            (codec, _) if codec.is_temporal() => temporal::encode_binary(value, out),
            (Codec::String, Value::String(s)) => {
                write_string_lenenc(out, s);
                Ok(())
            }
            (Codec::Bytes, Value::Bytes(b)) => {
                string::encode_lenenc(b, out);
                Ok(())
            }
            (Codec::BitSet, Value::BitSet(bits)) => {
                write_bytes_lenenc(out, &bits.to_wire());
                Ok(())
            }
            (codec, value) => Err(mismatch(codec, value)),
        }
    }
}

fn mismatch(codec: Codec, value: &Value) -> Error {
    Error::LibraryBug(eyre!(
        "{codec:?} cannot encode a {:?} value",
        value.host_type()
    ))
}

/// Host type a column decodes to when the caller does not ask for one
pub fn natural_host_type(column: &ColumnDefinition, ctx: DecodeContext) -> HostType {
    let ty = column.column_type;
    let unsigned = column.is_unsigned();
    match ty {
        ColumnType::MYSQL_TYPE_TINY if ctx.tiny_int1_is_bool && column.column_length == 1 => {
            HostType::Bool
        }
        ColumnType::MYSQL_TYPE_TINY if unsigned => HostType::U8,
        ColumnType::MYSQL_TYPE_TINY => HostType::I8,
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR if unsigned => HostType::U16,
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => HostType::I16,
        ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG if unsigned => HostType::U32,
        ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => HostType::I32,
        ColumnType::MYSQL_TYPE_LONGLONG if unsigned => HostType::U64,
        ColumnType::MYSQL_TYPE_LONGLONG => HostType::I64,
        ColumnType::MYSQL_TYPE_FLOAT => HostType::F32,
        ColumnType::MYSQL_TYPE_DOUBLE => HostType::F64,
        ColumnType::MYSQL_TYPE_BIT if column.column_length == 1 => HostType::Bool,
        ColumnType::MYSQL_TYPE_BIT => HostType::BitSet,
        ColumnType::MYSQL_TYPE_GEOMETRY => HostType::Bytes,
        _ if ty.is_decimal() => HostType::Decimal,
        _ if ty.is_date() => HostType::Date,
        _ if ty.is_datetime() => HostType::DateTime,
        // TIME may be negative or longer than a day
        _ if ty.is_time() => HostType::Duration,
        _ if (ty.is_string() || ty.is_blob()) && column.is_binary() => HostType::Bytes,
        _ => HostType::String,
    }
}

/// Decode one non-NULL column value.
///
/// `index` only labels errors.
pub fn decode(
    index: usize,
    column: &ColumnDefinition,
    host: HostType,
    bytes: &[u8],
    ctx: DecodeContext,
) -> Result<Value> {
    let (codec, host) = if host == HostType::Any {
        let natural = natural_host_type(column, ctx);
        let codec = Codec::for_host(natural).ok_or_else(|| Error::NoDecoder {
            index,
            column_type: column.column_type,
            host: natural,
        })?;
        (codec, natural)
    } else {
        let codec = CODECS
            .iter()
            .copied()
            .find(|codec| codec.can_decode(column, host))
            .ok_or(Error::NoDecoder {
                index,
                column_type: column.column_type,
                host,
            })?;
        (codec, host)
    };
    let decoded = match ctx.protocol {
        Protocol::Text => codec.decode_text(column, host, bytes),
        Protocol::Binary => codec.decode_binary(column, host, bytes),
    };
    decoded.map_err(|e| {
        let msg = match e {
            Error::ParseError(msg) => msg,
            Error::InvalidPacket | Error::UnexpectedEof => e.to_string(),
            e => return e,
        };
        Error::ParseError(format!(
            "column {index} ({:?} as {host:?}): {msg}",
            column.column_type
        ))
    })
}

/// Encode a bound value. NULL without a type is sent as a string.
pub fn encode(
    index: usize,
    value: &Value,
    protocol: Protocol,
    ctx: &EncodeContext,
) -> Result<BindValue> {
    if value.is_null() {
        return Ok(BindValue::null(Codec::String));
    }
    let host = value.host_type();
    let codec = Codec::for_host(host)
        .filter(|codec| codec.can_encode(host))
        .ok_or(Error::NoEncoder { index, host })?;
    let mut bytes = ctx.buffer_pool.get_value_buffer();
    match protocol {
        Protocol::Text => codec.encode_text(value, ctx, &mut bytes)?,
        Protocol::Binary => codec.encode_binary(value, &mut bytes)?,
    }
    Ok(BindValue {
        codec,
        bytes: Some(bytes),
    })
}

/// NULL carrying the metadata of `host`'s codec
pub fn encode_null(index: usize, host: HostType) -> Result<BindValue> {
    if host == HostType::Any {
        return Ok(BindValue::null(Codec::String));
    }
    Codec::for_host(host)
        .filter(|codec| codec.can_encode(host))
        .map(BindValue::null)
        .ok_or(Error::NoEncoder { index, host })
}

/// NULL carrying the metadata of `sql_type`
pub fn encode_typed_null(sql_type: SqlType) -> BindValue {
    BindValue::null(sql_type.codec())
}

/// A typed NULL keeps its SQL type. Other values are encoded by their host type.
pub fn encode_parameter(
    index: usize,
    parameter: &Parameter,
    protocol: Protocol,
    ctx: &EncodeContext,
) -> Result<BindValue> {
    match (&parameter.value, parameter.sql_type) {
        (Value::Null, Some(sql_type)) => Ok(encode_typed_null(sql_type)),
        (value, _) => encode(index, value, protocol, ctx),
    }
}
