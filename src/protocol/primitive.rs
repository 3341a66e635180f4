use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

/// Leading byte of a length-encoded NULL
pub const LENENC_NULL: u8 = 0xFB;

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&first, rest)) => Ok((first, rest)),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    let (value, rest) = U16LE::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 3-byte little-endian integer
pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    match data {
        [a, b, c, rest @ ..] => Ok((u32::from_le_bytes([*a, *b, *c, 0]), rest)),
        _ => Err(Error::UnexpectedEof),
    }
}

/// Read 4-byte little-endian integer
pub fn read_int_4(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) = U32LE::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 8-byte little-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    let (value, rest) = U64LE::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read length-encoded integer that may be NULL (0xFB)
///
/// - `0x00..=0xFA`: the value itself
/// - `0xFB`: NULL
/// - `0xFC`: 2-byte integer follows
/// - `0xFD`: 3-byte integer follows
/// - `0xFE`: 8-byte integer follows
pub fn read_lenenc(data: &[u8]) -> Result<(Option<u64>, &[u8])> {
    let (first, rest) = read_int_1(data)?;
    match first {
        LENENC_NULL => Ok((None, rest)),
        0xFC => {
            let (val, rest) = read_int_2(rest)?;
            Ok((Some(val as u64), rest))
        }
        0xFD => {
            let (val, rest) = read_int_3(rest)?;
            Ok((Some(val as u64), rest))
        }
        0xFE => {
            let (val, rest) = read_int_8(rest)?;
            Ok((Some(val), rest))
        }
        0xFF => Err(Error::InvalidPacket),
        val => Ok((Some(val as u64), rest)),
    }
}

/// Read length-encoded integer where NULL is not allowed
pub fn read_int_lenenc(data: &[u8]) -> Result<(u64, &[u8])> {
    match read_lenenc(data)? {
        (Some(val), rest) => Ok((val, rest)),
        (None, _) => Err(Error::InvalidPacket),
    }
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    data.split_at_checked(len).ok_or(Error::UnexpectedEof)
}

/// Read null-terminated string
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match data.iter().position(|&byte| byte == 0) {
        Some(i) => Ok((&data[..i], &data[i + 1..])),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read length-encoded string that may be NULL
pub fn read_bytes_lenenc(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    match read_lenenc(data)? {
        (None, rest) => Ok((None, rest)),
        (Some(len), rest) => {
            let len = usize::try_from(len).map_err(|_| Error::UnexpectedEof)?;
            let (bytes, rest) = read_string_fix(rest, len)?;
            Ok((Some(bytes), rest))
        }
    }
}

/// Read length-encoded string
pub fn read_string_lenenc(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match read_bytes_lenenc(data)? {
        (Some(bytes), rest) => Ok((bytes, rest)),
        (None, _) => Err(Error::InvalidPacket),
    }
}

/// Write 1-byte integer
pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian integer
pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian integer
pub fn write_int_4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write length-encoded integer using the shortest representation
pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xfc);
        write_int_2(out, value as u16);
    } else if value < (1 << 24) {
        out.push(0xfd);
        write_int_3(out, value as u32);
    } else {
        out.push(0xfe);
        write_int_8(out, value);
    }
}

/// Write length-encoded NULL
pub fn write_lenenc_null(out: &mut Vec<u8>) {
    out.push(LENENC_NULL);
}

/// Write null-terminated string
pub fn write_string_null(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Write length-encoded string
pub fn write_string_lenenc(out: &mut Vec<u8>, s: &str) {
    write_bytes_lenenc(out, s.as_bytes());
}

/// Write length-encoded bytes
pub fn write_bytes_lenenc(out: &mut Vec<u8>, data: &[u8]) {
    write_int_lenenc(out, data.len() as u64);
    out.extend_from_slice(data);
}
