/// Binary protocol layouts: temporal values and the NULL bitmap
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

// ============================================================================
// Temporal Types
// ============================================================================

/// TIMESTAMP - 4 bytes (DATE/DATETIME/TIMESTAMP with date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Timestamp4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

/// TIMESTAMP - 7 bytes (DATE/DATETIME/TIMESTAMP without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Timestamp7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// TIMESTAMP - 11 bytes (DATE/DATETIME/TIMESTAMP with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Timestamp11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

/// TIME - 8 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// TIME - 12 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

/// Fields of a DATE, DATETIME or TIMESTAMP value, independent of wire format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampParts {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl TimestampParts {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_zero_date(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }
}

/// Fields of a TIME value with the day count folded into `hours`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeParts {
    pub negative: bool,
    pub hours: u32,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

fn cast<T: FromBytes + KnownLayout + Immutable>(data: &[u8]) -> Result<(&T, &[u8])> {
    T::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)
}

/// Interpret a binary DATE/DATETIME/TIMESTAMP body of 0, 4, 7 or 11 bytes.
/// Which fields are present is implied by the length.
pub fn parse_binary_timestamp(body: &[u8]) -> Result<TimestampParts> {
    match body.len() {
        0 => Ok(TimestampParts::default()),
        4 => {
            let (ts, _) = cast::<Timestamp4>(body)?;
            Ok(TimestampParts {
                year: ts.year.get(),
                month: ts.month,
                day: ts.day,
                ..Default::default()
            })
        }
        7 => {
            let (ts, _) = cast::<Timestamp7>(body)?;
            Ok(TimestampParts {
                year: ts.year.get(),
                month: ts.month,
                day: ts.day,
                hour: ts.hour,
                minute: ts.minute,
                second: ts.second,
                microsecond: 0,
            })
        }
        11 => {
            let (ts, _) = cast::<Timestamp11>(body)?;
            Ok(TimestampParts {
                year: ts.year.get(),
                month: ts.month,
                day: ts.day,
                hour: ts.hour,
                minute: ts.minute,
                second: ts.second,
                microsecond: ts.microsecond.get(),
            })
        }
        _ => Err(Error::InvalidPacket),
    }
}

/// Interpret a binary TIME body of 0, 8 or 12 bytes
pub fn parse_binary_time(body: &[u8]) -> Result<TimeParts> {
    match body.len() {
        0 => Ok(TimeParts::default()),
        8 => {
            let (time, _) = cast::<Time8>(body)?;
            Ok(TimeParts {
                negative: time.is_negative != 0,
                hours: time.days.get().saturating_mul(24).saturating_add(time.hour as u32),
                minute: time.minute,
                second: time.second,
                microsecond: 0,
            })
        }
        12 => {
            let (time, _) = cast::<Time12>(body)?;
            Ok(TimeParts {
                negative: time.is_negative != 0,
                hours: time.days.get().saturating_mul(24).saturating_add(time.hour as u32),
                minute: time.minute,
                second: time.second,
                microsecond: time.microsecond.get(),
            })
        }
        _ => Err(Error::InvalidPacket),
    }
}

fn read_length_prefixed(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_int_1(data)?;
    read_string_fix(rest, len as usize)
}

/// Read a length-prefixed binary DATE/DATETIME/TIMESTAMP
pub fn read_binary_timestamp(data: &[u8]) -> Result<(TimestampParts, &[u8])> {
    let (body, rest) = read_length_prefixed(data)?;
    Ok((parse_binary_timestamp(body)?, rest))
}

/// Read a length-prefixed binary TIME
pub fn read_binary_time(data: &[u8]) -> Result<(TimeParts, &[u8])> {
    let (body, rest) = read_length_prefixed(data)?;
    Ok((parse_binary_time(body)?, rest))
}

/// Write a DATE as the 4-byte layout
pub fn write_binary_date(out: &mut Vec<u8>, parts: &TimestampParts) {
    let ts = Timestamp4 {
        year: U16LE::new(parts.year),
        month: parts.month,
        day: parts.day,
    };
    out.push(4);
    out.extend_from_slice(ts.as_bytes());
}

/// Write a DATETIME using the 7-byte layout, or 11 bytes when microseconds are present
pub fn write_binary_timestamp(out: &mut Vec<u8>, parts: &TimestampParts) {
    if parts.microsecond == 0 {
        let ts = Timestamp7 {
            year: U16LE::new(parts.year),
            month: parts.month,
            day: parts.day,
            hour: parts.hour,
            minute: parts.minute,
            second: parts.second,
        };
        out.push(7);
        out.extend_from_slice(ts.as_bytes());
    } else {
        let ts = Timestamp11 {
            year: U16LE::new(parts.year),
            month: parts.month,
            day: parts.day,
            hour: parts.hour,
            minute: parts.minute,
            second: parts.second,
            microsecond: U32LE::new(parts.microsecond),
        };
        out.push(11);
        out.extend_from_slice(ts.as_bytes());
    }
}

/// Write a TIME using the 8-byte layout, or 12 bytes when microseconds are present
pub fn write_binary_time(out: &mut Vec<u8>, parts: &TimeParts) {
    let days = U32LE::new(parts.hours / 24);
    let hour = (parts.hours % 24) as u8;
    if parts.microsecond == 0 {
        let time = Time8 {
            is_negative: parts.negative as u8,
            days,
            hour,
            minute: parts.minute,
            second: parts.second,
        };
        out.push(8);
        out.extend_from_slice(time.as_bytes());
    } else {
        let time = Time12 {
            is_negative: parts.negative as u8,
            days,
            hour,
            minute: parts.minute,
            second: parts.second,
            microsecond: U32LE::new(parts.microsecond),
        };
        out.push(12);
        out.extend_from_slice(time.as_bytes());
    }
}

// ============================================================================
// NULL Bitmap
// ============================================================================

/// NULL bitmap for binary protocol
///
/// For result sets (COM_STMT_EXECUTE response), the bitmap has an offset of 2 bits.
/// For prepared statement parameters, the offset is 0 bits.
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    /// Number of bitmap bytes in a binary result row of `num_columns`
    pub const fn result_set_len(num_columns: usize) -> usize {
        (num_columns + 7 + 2) >> 3
    }

    /// Number of bitmap bytes in a COM_STMT_EXECUTE of `num_params`
    pub const fn parameters_len(num_params: usize) -> usize {
        (num_params + 7) >> 3
    }

    /// Create a NULL bitmap for result sets (offset = 2)
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    /// Create a NULL bitmap for parameters (offset = 0)
    pub fn for_parameters(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 0 }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        match self.bitmap.get(bit_pos >> 3) {
            Some(byte) => byte & (1 << (bit_pos & 7)) != 0,
            None => false,
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bitmap
    }
}

/// Append a parameter NULL bitmap (offset 0) built from `nulls`
pub fn write_parameter_null_bitmap(out: &mut Vec<u8>, nulls: impl ExactSizeIterator<Item = bool>) {
    let start = out.len();
    out.resize(start + NullBitmap::parameters_len(nulls.len()), 0);
    for (idx, is_null) in nulls.enumerate() {
        if is_null {
            out[start + (idx >> 3)] |= 1 << (idx & 7);
        }
    }
}
