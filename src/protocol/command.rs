use crate::codec::BindValue;
use crate::constant::CommandByte;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::value::write_parameter_null_bitmap;

/// Write COM_QUERY command
pub fn write_query(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::Query as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Write COM_STMT_EXECUTE with binary-encoded parameters
pub fn write_execute(out: &mut Vec<u8>, statement_id: u32, params: &[BindValue]) {
    write_int_1(out, CommandByte::StmtExecute as u8);
    write_int_4(out, statement_id);

    // flags (1 byte) - CURSOR_TYPE_NO_CURSOR
    write_int_1(out, 0x00);

    // iteration count (4 bytes) - always 1
    write_int_4(out, 1);

    if params.is_empty() {
        return;
    }

    write_parameter_null_bitmap(out, params.iter().map(BindValue::is_null));

    // new-params-bound-flag, then (type, flag) per parameter
    write_int_1(out, 0x01);
    for param in params {
        write_int_1(out, param.column_type() as u8);
        write_int_1(out, 0x00);
    }

    for bytes in params.iter().filter_map(|param| param.bytes.as_deref()) {
        out.extend_from_slice(bytes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Sql,
    Quoted(u8),
    LineComment,
    BlockComment,
}

/// Write COM_QUERY with each `?` placeholder replaced by a text-encoded parameter.
///
/// Placeholders inside quoted strings, quoted identifiers and comments are left alone.
pub fn write_text_query(
    out: &mut Vec<u8>,
    sql: &str,
    params: &[BindValue],
    no_backslash_escapes: bool,
) -> Result<()> {
    write_int_1(out, CommandByte::Query as u8);

    let bytes = sql.as_bytes();
    let mut params_iter = params.iter();
    let mut scan = Scan::Sql;
    let mut i = 0;
    while let Some(&byte) = bytes.get(i) {
        let next = bytes.get(i + 1).copied();
        match scan {
            Scan::Sql => match byte {
                b'?' => {
                    let param = params_iter.next().ok_or_else(|| {
                        Error::BadUsageError(format!(
                            "query has more placeholders than the {} parameters given",
                            params.len()
                        ))
                    })?;
                    match param.bytes.as_deref() {
                        Some(literal) => out.extend_from_slice(literal),
                        None => out.extend_from_slice(b"NULL"),
                    }
                    i += 1;
                    continue;
                }
                b'\'' | b'"' | b'`' => scan = Scan::Quoted(byte),
                b'#' => scan = Scan::LineComment,
                b'-' if next == Some(b'-')
                    && bytes
                        .get(i + 2)
                        .is_none_or(|c| c.is_ascii_whitespace()) =>
                {
                    scan = Scan::LineComment
                }
                b'/' if next == Some(b'*') => {
                    out.extend_from_slice(b"/*");
                    scan = Scan::BlockComment;
                    i += 2;
                    continue;
                }
                _ => {}
            },
            Scan::Quoted(quote) => {
                if byte == b'\\' && quote != b'`' && !no_backslash_escapes {
                    out.push(byte);
                    if let Some(escaped) = next {
                        out.push(escaped);
                    }
                    i += 2;
                    continue;
                }
                if byte == quote {
                    scan = Scan::Sql;
                }
            }
            Scan::LineComment => {
                if byte == b'\n' {
                    scan = Scan::Sql;
                }
            }
            Scan::BlockComment => {
                if byte == b'*' && next == Some(b'/') {
                    out.extend_from_slice(b"*/");
                    scan = Scan::Sql;
                    i += 2;
                    continue;
                }
            }
        }
        out.push(byte);
        i += 1;
    }

    if params_iter.next().is_some() {
        return Err(Error::BadUsageError(format!(
            "query has fewer placeholders than the {} parameters given",
            params.len()
        )));
    }
    Ok(())
}
