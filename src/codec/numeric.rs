//! Integer, floating point and decimal conversions shared by the numeric codecs.
//!
//! Every numeric column is first read into a [`Numeric`], then narrowed to the requested host
//! type with a range check.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::codec::string::utf8;
use crate::codec::value::{HostType, Value};
use crate::codec::{Codec, Protocol};
use crate::constant::ColumnType;
use crate::error::{Error, Result, eyre};
use crate::protocol::column_definition::ColumnDefinition;
use crate::protocol::primitive::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Numeric {
    Int(i128),
    Float(f64),
    Decimal(Decimal),
}

fn out_of_range(value: impl std::fmt::Display, host: HostType) -> Error {
    Error::ParseError(format!("value {value} is out of range for {host:?}"))
}

/// Big-endian BIT(n) bytes as an unsigned integer
pub(crate) fn fold_bits(bytes: &[u8]) -> Result<u64> {
    if bytes.len() > 8 {
        return Err(Error::ParseError(format!(
            "BIT value of {} bytes does not fit in 64 bits",
            bytes.len()
        )));
    }
    Ok(bytes
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | byte as u64))
}

/// Integer first, then exact decimal, then float
pub(crate) fn parse_str(text: &str) -> Result<Numeric> {
    let text = text.trim();
    if let Ok(int) = text.parse::<i128>() {
        return Ok(Numeric::Int(int));
    }
    if let Ok(decimal) = Decimal::from_str(text) {
        return Ok(Numeric::Decimal(decimal));
    }
    match text.parse::<f64>() {
        Ok(float) => Ok(Numeric::Float(float)),
        Err(_) => Err(Error::ParseError(format!("'{text}' is not a number"))),
    }
}

fn parse_text(column: &ColumnDefinition, bytes: &[u8]) -> Result<Numeric> {
    let ty = column.column_type;
    if ty == ColumnType::MYSQL_TYPE_BIT {
        return Ok(Numeric::Int(fold_bits(bytes)? as i128));
    }
    let text = utf8(bytes)?;
    if ty.is_integer() {
        text.parse::<i128>()
            .map(Numeric::Int)
            .map_err(|_| Error::ParseError(format!("'{text}' is not an integer")))
    } else if ty.is_float() {
        text.parse::<f64>()
            .map(Numeric::Float)
            .map_err(|_| Error::ParseError(format!("'{text}' is not a float")))
    } else if ty.is_decimal() {
        Decimal::from_str(text)
            .map(Numeric::Decimal)
            .map_err(|e| Error::ParseError(format!("'{text}' is not a decimal: {e}")))
    } else {
        parse_str(text)
    }
}

fn parse_binary(column: &ColumnDefinition, bytes: &[u8]) -> Result<Numeric> {
    let unsigned = column.is_unsigned();
    let int = match column.column_type {
        ColumnType::MYSQL_TYPE_TINY => {
            let (v, _) = read_int_1(bytes)?;
            if unsigned { v as i128 } else { v as i8 as i128 }
        }
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
            let (v, _) = read_int_2(bytes)?;
            if unsigned { v as i128 } else { v as i16 as i128 }
        }
        ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
            let (v, _) = read_int_4(bytes)?;
            if unsigned { v as i128 } else { v as i32 as i128 }
        }
        ColumnType::MYSQL_TYPE_LONGLONG => {
            let (v, _) = read_int_8(bytes)?;
            if unsigned { v as i128 } else { v as i64 as i128 }
        }
        ColumnType::MYSQL_TYPE_FLOAT => {
            let (v, _) = read_int_4(bytes)?;
            return Ok(Numeric::Float(f32::from_bits(v) as f64));
        }
        ColumnType::MYSQL_TYPE_DOUBLE => {
            let (v, _) = read_int_8(bytes)?;
            return Ok(Numeric::Float(f64::from_bits(v)));
        }
        // DECIMAL, BIT and character columns carry the same bytes in both protocols
        _ => return parse_text(column, bytes),
    };
    Ok(Numeric::Int(int))
}

pub(crate) fn parse(column: &ColumnDefinition, protocol: Protocol, bytes: &[u8]) -> Result<Numeric> {
    match protocol {
        Protocol::Text => parse_text(column, bytes),
        Protocol::Binary => parse_binary(column, bytes),
    }
}

impl Numeric {
    pub(crate) fn is_zero(self) -> bool {
        match self {
            Numeric::Int(v) => v == 0,
            Numeric::Float(v) => v == 0.0,
            Numeric::Decimal(v) => v.is_zero(),
        }
    }

    /// Fractional parts are truncated toward zero
    pub(crate) fn to_i128(self) -> Result<i128> {
        match self {
            Numeric::Int(v) => Ok(v),
            Numeric::Float(v) => {
                let truncated = v.trunc();
                if truncated.is_finite()
                    && truncated >= i128::MIN as f64
                    && truncated < i128::MAX as f64
                {
                    Ok(truncated as i128)
                } else {
                    Err(out_of_range(v, HostType::I128))
                }
            }
            Numeric::Decimal(v) => v
                .trunc()
                .to_i128()
                .ok_or_else(|| out_of_range(v, HostType::I128)),
        }
    }

    pub(crate) fn to_f64(self) -> Result<f64> {
        match self {
            Numeric::Int(v) => Ok(v as f64),
            Numeric::Float(v) => Ok(v),
            Numeric::Decimal(v) => v.to_f64().ok_or_else(|| out_of_range(v, HostType::F64)),
        }
    }

    pub(crate) fn to_decimal(self) -> Result<Decimal> {
        match self {
            Numeric::Int(v) => {
                Decimal::try_from_i128_with_scale(v, 0).map_err(|_| out_of_range(v, HostType::Decimal))
            }
            Numeric::Float(v) => Decimal::from_f64(v).ok_or_else(|| out_of_range(v, HostType::Decimal)),
            Numeric::Decimal(v) => Ok(v),
        }
    }

    pub(crate) fn into_host(self, host: HostType) -> Result<Value> {
        match host {
            HostType::Bool => Ok(Value::Bool(!self.is_zero())),
            HostType::I8 => narrow(self, host, Value::I8),
            HostType::I16 => narrow(self, host, Value::I16),
            HostType::I32 => narrow(self, host, Value::I32),
            HostType::I64 => narrow(self, host, Value::I64),
            HostType::U8 => narrow(self, host, Value::U8),
            HostType::U16 => narrow(self, host, Value::U16),
            HostType::U32 => narrow(self, host, Value::U32),
            HostType::U64 => narrow(self, host, Value::U64),
            HostType::I128 => Ok(Value::I128(self.to_i128()?)),
            HostType::F32 => Ok(Value::F32(self.to_f64()? as f32)),
            HostType::F64 => Ok(Value::F64(self.to_f64()?)),
            HostType::Decimal => Ok(Value::Decimal(self.to_decimal()?)),
            HostType::String => Ok(Value::String(self.to_string())),
            _ => Err(Error::LibraryBug(eyre!("{host:?} is not a numeric host type"))),
        }
    }
}

fn narrow<T: TryFrom<i128>>(n: Numeric, host: HostType, wrap: fn(T) -> Value) -> Result<Value> {
    let wide = n.to_i128()?;
    T::try_from(wide)
        .map(wrap)
        .map_err(|_| out_of_range(wide, host))
}

impl std::fmt::Display for Numeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Numeric::Int(v) => write!(f, "{v}"),
            Numeric::Float(v) => write!(f, "{v}"),
            Numeric::Decimal(v) => write!(f, "{v}"),
        }
    }
}

/// Numeric view of a bound value
pub(crate) fn from_value(value: &Value) -> Option<Numeric> {
    Some(match value {
        Value::Bool(v) => Numeric::Int(*v as i128),
        Value::I8(v) => Numeric::Int(*v as i128),
        Value::I16(v) => Numeric::Int(*v as i128),
        Value::I32(v) => Numeric::Int(*v as i128),
        Value::I64(v) => Numeric::Int(*v as i128),
        Value::I128(v) => Numeric::Int(*v),
        Value::U8(v) => Numeric::Int(*v as i128),
        Value::U16(v) => Numeric::Int(*v as i128),
        Value::U32(v) => Numeric::Int(*v as i128),
        Value::U64(v) => Numeric::Int(*v as i128),
        Value::F32(v) => Numeric::Float(*v as f64),
        Value::F64(v) => Numeric::Float(*v),
        Value::Decimal(v) => Numeric::Decimal(*v),
        _ => return None,
    })
}

fn not_numeric(value: &Value) -> Error {
    Error::LibraryBug(eyre!("{:?} is not numeric", value.host_type()))
}

/// SQL literal for a numeric value
pub(crate) fn encode_text(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let numeric = from_value(value).ok_or_else(|| not_numeric(value))?;
    match numeric {
        Numeric::Float(v) if !v.is_finite() => {
            return Err(Error::BadUsageError(format!(
                "{v} cannot be sent as a SQL literal"
            )));
        }
        _ => {}
    }
    out.extend_from_slice(numeric.to_string().as_bytes());
    Ok(())
}

/// Binary protocol value in the width of `codec`'s wire type
pub(crate) fn encode_binary(codec: Codec, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let numeric = from_value(value).ok_or_else(|| not_numeric(value))?;
    let host = value.host_type();
    match codec {
        Codec::Bool => write_int_1(out, !numeric.is_zero() as u8),
        Codec::Byte => {
            let v = numeric.to_i128()?;
            let v = i8::try_from(v).map_err(|_| out_of_range(v, host))?;
            write_int_1(out, v as u8);
        }
        Codec::Short => {
            let v = numeric.to_i128()?;
            let v = i16::try_from(v).map_err(|_| out_of_range(v, host))?;
            write_int_2(out, v as u16);
        }
        Codec::Int => {
            let v = numeric.to_i128()?;
            let v = i32::try_from(v).map_err(|_| out_of_range(v, host))?;
            write_int_4(out, v as u32);
        }
        Codec::Long => {
            let v = numeric.to_i128()?;
            let v = i64::try_from(v).map_err(|_| out_of_range(v, host))?;
            write_int_8(out, v as u64);
        }
        Codec::Float => write_int_4(out, (numeric.to_f64()? as f32).to_bits()),
        Codec::Double => write_int_8(out, numeric.to_f64()?.to_bits()),
        // NEWDECIMAL travels as a length-encoded string
        Codec::BigInt | Codec::Decimal => write_string_lenenc(out, &numeric.to_string()),
        other => {
            return Err(Error::LibraryBug(eyre!(
                "{other:?} does not encode numeric values"
            )));
        }
    }
    Ok(())
}
