//! Character, byte, stream and BIT codecs

use std::io::Cursor;

use crate::codec::value::{BitSet, Value};
use crate::codec::{EncodeContext, Protocol, numeric, temporal};
use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::protocol::column_definition::ColumnDefinition;
use crate::protocol::primitive::write_bytes_lenenc;

pub(crate) fn utf8(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes)
        .map_err(|_| Error::ParseError("column value is not valid UTF-8".to_owned()))
}

/// Append `bytes` escaped for use inside a quoted SQL literal
pub(crate) fn escape_into(out: &mut Vec<u8>, bytes: &[u8], no_backslash_escapes: bool) {
    if no_backslash_escapes {
        for &byte in bytes {
            if byte == b'\'' {
                out.push(b'\'');
            }
            out.push(byte);
        }
    } else {
        for &byte in bytes {
            match byte {
                b'\'' | b'"' | b'\\' => {
                    out.push(b'\\');
                    out.push(byte);
                }
                0 => out.extend_from_slice(b"\\0"),
                _ => out.push(byte),
            }
        }
    }
}

/// Character value of any column.
///
/// Binary numeric and temporal columns are rendered the way the text protocol would send them.
pub(crate) fn decode_string(
    column: &ColumnDefinition,
    protocol: Protocol,
    bytes: &[u8],
) -> Result<Value> {
    let ty = column.column_type;
    if ty == ColumnType::MYSQL_TYPE_BIT {
        return Ok(Value::String(numeric::fold_bits(bytes)?.to_string()));
    }
    if protocol == Protocol::Binary {
        if ty.is_integer() || ty.is_float() {
            let value = numeric::parse(column, protocol, bytes)?;
            return Ok(Value::String(value.to_string()));
        }
        if ty.is_date() || ty.is_datetime() || ty.is_time() {
            return temporal::format_binary(column, bytes).map(Value::String);
        }
    }
    utf8(bytes).map(|s| Value::String(s.to_owned()))
}

pub(crate) fn decode_bytes(bytes: &[u8]) -> Value {
    Value::Bytes(bytes.to_vec())
}

pub(crate) fn decode_stream(bytes: &[u8]) -> Value {
    Value::Stream(Cursor::new(bytes.to_vec()))
}

pub(crate) fn decode_bitset(bytes: &[u8]) -> Value {
    Value::BitSet(BitSet::from_wire(bytes))
}

/// `'...'` with the content escaped
pub(crate) fn encode_string_text(s: &str, ctx: &EncodeContext, out: &mut Vec<u8>) {
    out.push(b'\'');
    escape_into(out, s.as_bytes(), ctx.no_backslash_escapes);
    out.push(b'\'');
}

/// `_binary '...'` with the content escaped
pub(crate) fn encode_bytes_text(bytes: &[u8], ctx: &EncodeContext, out: &mut Vec<u8>) {
    out.extend_from_slice(b"_binary '");
    escape_into(out, bytes, ctx.no_backslash_escapes);
    out.push(b'\'');
}

/// `b'0101'` bit-value literal, most significant bit first
pub(crate) fn encode_bitset_text(bits: &BitSet, out: &mut Vec<u8>) {
    out.extend_from_slice(b"b'");
    let len = bits.len().max(1);
    for bit in (0..len).rev() {
        out.push(if bits.get(bit) { b'1' } else { b'0' });
    }
    out.push(b'\'');
}

pub(crate) fn encode_lenenc(bytes: &[u8], out: &mut Vec<u8>) {
    write_bytes_lenenc(out, bytes);
}
