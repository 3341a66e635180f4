//! DATE, DATETIME, TIMESTAMP and TIME codecs.
//!
//! Text values are scanned one byte at a time and folded into numeric fields. Binary values
//! use the length-implied layouts in [`crate::protocol::value`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::codec::Protocol;
use crate::codec::value::Value;
use crate::error::{Error, Result, eyre};
use crate::protocol::column_definition::ColumnDefinition;
use crate::protocol::value::{
    TimeParts, TimestampParts, parse_binary_time, parse_binary_timestamp, write_binary_date,
    write_binary_time, write_binary_timestamp,
};

fn invalid(text: &[u8], what: &str) -> Error {
    Error::ParseError(format!(
        "'{}' cannot be decoded as {what}",
        String::from_utf8_lossy(text)
    ))
}

/// Fold digits of `text` into up to `N` fields.
///
/// `-`, `:`, space and `T` start the next field. `.` starts the fraction, which is always the
/// last field and is scaled to microseconds. Returns the fields and whether a fraction was seen.
fn fold_fields<const N: usize>(text: &[u8], what: &str) -> Result<[u32; N]> {
    let mut fields = [0u32; N];
    let mut idx = 0;
    let mut fraction_digits: Option<u32> = None;
    for &byte in text {
        match byte {
            b'-' | b':' | b' ' | b'T' if fraction_digits.is_none() => {
                idx += 1;
                if idx >= N - 1 {
                    return Err(invalid(text, what));
                }
            }
            b'.' if fraction_digits.is_none() => {
                idx = N - 1;
                fraction_digits = Some(0);
            }
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u32;
                match fraction_digits.as_mut() {
                    // digits past microseconds are dropped
                    Some(n) if *n >= 6 => continue,
                    Some(n) => *n += 1,
                    None => {}
                }
                fields[idx] = fields[idx]
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| invalid(text, what))?;
            }
            _ => return Err(invalid(text, what)),
        }
    }
    if let Some(n) = fraction_digits {
        for _ in n..6 {
            fields[N - 1] *= 10;
        }
    }
    Ok(fields)
}

fn narrow<T: TryFrom<u32>>(v: u32, text: &[u8], what: &str) -> Result<T> {
    T::try_from(v).map_err(|_| invalid(text, what))
}

/// The server's zero date decodes to `None`. A zero date with a time of day becomes
/// January 1st of year 0 at that time.
fn normalize(mut parts: TimestampParts) -> Option<TimestampParts> {
    if parts.is_zero() {
        return None;
    }
    if parts.has_zero_date() {
        parts.month = 1;
        parts.day = 1;
    }
    Some(parts)
}

/// Parse `YYYY-MM-DD[ HH:MM:SS[.ffffff]]`
pub fn parse_timestamp(text: &[u8]) -> Result<Option<TimestampParts>> {
    const WHAT: &str = "a timestamp";
    let [year, month, day, hour, minute, second, microsecond] = fold_fields::<7>(text, WHAT)?;
    Ok(normalize(TimestampParts {
        year: narrow(year, text, WHAT)?,
        month: narrow(month, text, WHAT)?,
        day: narrow(day, text, WHAT)?,
        hour: narrow(hour, text, WHAT)?,
        minute: narrow(minute, text, WHAT)?,
        second: narrow(second, text, WHAT)?,
        microsecond,
    }))
}

/// Parse `[-]HHH:MM:SS[.ffffff]`. Hours may exceed 23.
pub fn parse_time(text: &[u8]) -> Result<TimeParts> {
    const WHAT: &str = "a time";
    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, text),
    };
    let [hours, minute, second, microsecond] = fold_fields::<4>(digits, WHAT)?;
    Ok(TimeParts {
        negative,
        hours,
        minute: narrow(minute, text, WHAT)?,
        second: narrow(second, text, WHAT)?,
        microsecond,
    })
}

fn to_date(parts: &TimestampParts) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(parts.year as i32, parts.month as u32, parts.day as u32)
        .ok_or_else(|| Error::ParseError(format!("{parts:?} is not a valid date")))
}

fn to_datetime(parts: &TimestampParts) -> Result<NaiveDateTime> {
    to_date(parts)?
        .and_hms_micro_opt(
            parts.hour as u32,
            parts.minute as u32,
            parts.second as u32,
            parts.microsecond,
        )
        .ok_or_else(|| Error::ParseError(format!("{parts:?} is not a valid datetime")))
}

fn time_of_day(hours: u32, minute: u8, second: u8, microsecond: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_micro_opt(hours % 24, minute as u32, second as u32, microsecond)
        .ok_or_else(|| Error::ParseError(format!("{hours}:{minute}:{second} is not a valid time")))
}

fn to_duration(parts: &TimeParts) -> Result<TimeDelta> {
    let secs = parts.hours as i64 * 3600 + parts.minute as i64 * 60 + parts.second as i64;
    let delta = TimeDelta::new(secs, parts.microsecond * 1000)
        .ok_or_else(|| Error::ParseError(format!("{parts:?} is not a valid duration")))?;
    Ok(if parts.negative { -delta } else { delta })
}

/// DATE/DATETIME/TIMESTAMP body, or text from a character column
fn read_timestamp(
    column: &ColumnDefinition,
    protocol: Protocol,
    bytes: &[u8],
) -> Result<Option<TimestampParts>> {
    let ty = column.column_type;
    if protocol == Protocol::Binary && (ty.is_date() || ty.is_datetime()) {
        return Ok(normalize(parse_binary_timestamp(bytes)?));
    }
    parse_timestamp(bytes)
}

fn read_time(column: &ColumnDefinition, protocol: Protocol, bytes: &[u8]) -> Result<TimeParts> {
    if protocol == Protocol::Binary && column.column_type.is_time() {
        return parse_binary_time(bytes);
    }
    parse_time(bytes)
}

pub(crate) fn decode_date(
    column: &ColumnDefinition,
    protocol: Protocol,
    bytes: &[u8],
) -> Result<Value> {
    match read_timestamp(column, protocol, bytes)? {
        Some(parts) => Ok(Value::Date(to_date(&parts)?)),
        None => Ok(Value::Null),
    }
}

pub(crate) fn decode_datetime(
    column: &ColumnDefinition,
    protocol: Protocol,
    bytes: &[u8],
) -> Result<Value> {
    if column.column_type.is_time() {
        // anchored to 1970-01-01, hours beyond a day are folded
        let time = read_time(column, protocol, bytes)?;
        let parts = TimestampParts {
            year: 1970,
            month: 1,
            day: 1,
            hour: (time.hours % 24) as u8,
            minute: time.minute,
            second: time.second,
            microsecond: time.microsecond,
        };
        return Ok(Value::DateTime(to_datetime(&parts)?));
    }
    match read_timestamp(column, protocol, bytes)? {
        Some(parts) => Ok(Value::DateTime(to_datetime(&parts)?)),
        None => Ok(Value::Null),
    }
}

pub(crate) fn decode_time(
    column: &ColumnDefinition,
    protocol: Protocol,
    bytes: &[u8],
) -> Result<Value> {
    if column.column_type.is_datetime() {
        return match read_timestamp(column, protocol, bytes)? {
            Some(p) => Ok(Value::Time(time_of_day(
                p.hour as u32,
                p.minute,
                p.second,
                p.microsecond,
            )?)),
            None => Ok(Value::Null),
        };
    }
    let time = read_time(column, protocol, bytes)?;
    if time.negative {
        return Err(invalid(bytes, "a time of day"));
    }
    Ok(Value::Time(time_of_day(
        time.hours,
        time.minute,
        time.second,
        time.microsecond,
    )?))
}

pub(crate) fn decode_duration(
    column: &ColumnDefinition,
    protocol: Protocol,
    bytes: &[u8],
) -> Result<Value> {
    if column.column_type.is_datetime() {
        return match read_timestamp(column, protocol, bytes)? {
            Some(p) => Ok(Value::Duration(to_duration(&TimeParts {
                negative: false,
                hours: p.hour as u32,
                minute: p.minute,
                second: p.second,
                microsecond: p.microsecond,
            })?)),
            None => Ok(Value::Null),
        };
    }
    Ok(Value::Duration(to_duration(&read_time(
        column, protocol, bytes,
    )?)?))
}

fn push_fraction(out: &mut String, microsecond: u32, decimals: u8) {
    let digits = match decimals {
        1..=6 => decimals as usize,
        _ if microsecond != 0 => 6,
        _ => return,
    };
    let padded = format!("{microsecond:06}");
    out.push('.');
    out.push_str(padded.get(..digits).unwrap_or(&padded));
}

/// Text rendering of a binary temporal value, as the text protocol would send it
pub(crate) fn format_binary(column: &ColumnDefinition, bytes: &[u8]) -> Result<String> {
    let ty = column.column_type;
    if ty.is_time() {
        let t = parse_binary_time(bytes)?;
        let mut out = format!(
            "{}{:02}:{:02}:{:02}",
            if t.negative { "-" } else { "" },
            t.hours,
            t.minute,
            t.second
        );
        push_fraction(&mut out, t.microsecond, column.decimals);
        return Ok(out);
    }
    let p = parse_binary_timestamp(bytes)?;
    if ty.is_date() {
        return Ok(format!("{:04}-{:02}-{:02}", p.year, p.month, p.day));
    }
    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        p.year, p.month, p.day, p.hour, p.minute, p.second
    );
    push_fraction(&mut out, p.microsecond, column.decimals);
    Ok(out)
}

fn date_parts(date: &NaiveDate) -> Result<TimestampParts> {
    let year = u16::try_from(date.year())
        .map_err(|_| Error::BadUsageError(format!("year {} cannot be sent", date.year())))?;
    Ok(TimestampParts {
        year,
        month: date.month() as u8,
        day: date.day() as u8,
        ..Default::default()
    })
}

fn datetime_parts(dt: &NaiveDateTime) -> Result<TimestampParts> {
    Ok(TimestampParts {
        hour: dt.hour() as u8,
        minute: dt.minute() as u8,
        second: dt.second() as u8,
        microsecond: dt.nanosecond() / 1000,
        ..date_parts(&dt.date())?
    })
}

fn time_parts(time: &NaiveTime) -> TimeParts {
    TimeParts {
        negative: false,
        hours: time.hour(),
        minute: time.minute() as u8,
        second: time.second() as u8,
        microsecond: time.nanosecond() / 1000,
    }
}

fn duration_parts(delta: &TimeDelta) -> Result<TimeParts> {
    let negative = *delta < TimeDelta::zero();
    let abs = if negative { -*delta } else { *delta };
    let secs = abs.num_seconds();
    let hours = u32::try_from(secs / 3600)
        .map_err(|_| Error::BadUsageError(format!("duration {delta} is too long")))?;
    Ok(TimeParts {
        negative,
        hours,
        minute: (secs / 60 % 60) as u8,
        second: (secs % 60) as u8,
        microsecond: abs.subsec_nanos().unsigned_abs() / 1000,
    })
}

fn push_time(out: &mut String, t: &TimeParts) {
    out.push_str(&format!(
        "{}{:02}:{:02}:{:02}",
        if t.negative { "-" } else { "" },
        t.hours,
        t.minute,
        t.second
    ));
    if t.microsecond != 0 {
        out.push_str(&format!(".{:06}", t.microsecond));
    }
}

/// Quoted SQL literal
pub(crate) fn encode_text(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let mut literal = String::from("'");
    match value {
        Value::Date(d) => {
            let p = date_parts(d)?;
            literal.push_str(&format!("{:04}-{:02}-{:02}", p.year, p.month, p.day));
        }
        Value::DateTime(dt) => {
            let p = datetime_parts(dt)?;
            literal.push_str(&format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                p.year, p.month, p.day, p.hour, p.minute, p.second
            ));
            if dt.nanosecond() != 0 {
                literal.push_str(&format!(".{:06}", p.microsecond));
            }
        }
        Value::Time(t) => push_time(&mut literal, &time_parts(t)),
        Value::Duration(d) => push_time(&mut literal, &duration_parts(d)?),
        other => {
            return Err(Error::LibraryBug(eyre!(
                "{:?} is not a temporal value",
                other.host_type()
            )));
        }
    }
    literal.push('\'');
    out.extend_from_slice(literal.as_bytes());
    Ok(())
}

/// Binary protocol value including its length byte
pub(crate) fn encode_binary(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Date(d) => write_binary_date(out, &date_parts(d)?),
        Value::DateTime(dt) => write_binary_timestamp(out, &datetime_parts(dt)?),
        Value::Time(t) => write_binary_time(out, &time_parts(t)),
        Value::Duration(d) => write_binary_time(out, &duration_parts(d)?),
        other => {
            return Err(Error::LibraryBug(eyre!(
                "{:?} is not a temporal value",
                other.host_type()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_full() {
        let parts = parse_timestamp(b"2024-03-05 07:08:09.123456").unwrap().unwrap();
        assert_eq!(
            parts,
            TimestampParts {
                year: 2024,
                month: 3,
                day: 5,
                hour: 7,
                minute: 8,
                second: 9,
                microsecond: 123456,
            }
        );
    }

    #[test]
    fn test_parse_timestamp_short_fraction_is_scaled() {
        let parts = parse_timestamp(b"2024-03-05 07:08:09.5").unwrap().unwrap();
        assert_eq!(parts.microsecond, 500_000);
        let parts = parse_timestamp(b"2024-03-05 07:08:09.05").unwrap().unwrap();
        assert_eq!(parts.microsecond, 50_000);
    }

    #[test]
    fn test_parse_timestamp_extra_fraction_digits_are_dropped() {
        let parts = parse_timestamp(b"2024-03-05 07:08:09.123456789").unwrap().unwrap();
        assert_eq!(parts.microsecond, 123456);
    }

    #[test]
    fn test_parse_timestamp_zero_dates() {
        assert_eq!(parse_timestamp(b"0000-00-00 00:00:00").unwrap(), None);
        assert_eq!(parse_timestamp(b"0000-00-00").unwrap(), None);

        let parts = parse_timestamp(b"0000-00-00 10:00:00").unwrap().unwrap();
        assert_eq!((parts.year, parts.month, parts.day), (0, 1, 1));
        assert_eq!(parts.hour, 10);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp(b"2024/03/05").is_err());
        assert!(parse_timestamp(b"2024-03-05 07:08:09:10:11").is_err());
        assert!(parse_timestamp(b"99999-01-01").is_err());
    }

    #[test]
    fn test_parse_time() {
        let t = parse_time(b"-838:59:59.5").unwrap();
        assert!(t.negative);
        assert_eq!(t.hours, 838);
        assert_eq!((t.minute, t.second), (59, 59));
        assert_eq!(t.microsecond, 500_000);
    }

    #[test]
    fn test_duration_round_trip_through_parts() {
        let delta = -(TimeDelta::new(30 * 3600 + 61, 250_000_000).unwrap());
        let parts = duration_parts(&delta).unwrap();
        assert!(parts.negative);
        assert_eq!(parts.hours, 30);
        assert_eq!((parts.minute, parts.second), (1, 1));
        assert_eq!(parts.microsecond, 250_000);
        assert_eq!(to_duration(&parts).unwrap(), delta);
    }

    #[test]
    fn test_encode_text_datetime_fraction_only_when_present() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let mut out = Vec::new();
        encode_text(&Value::DateTime(dt), &mut out).unwrap();
        assert_eq!(out, b"'2024-03-05 07:08:09'");

        out.clear();
        let dt = dt.with_nanosecond(500_000_000).unwrap();
        encode_text(&Value::DateTime(dt), &mut out).unwrap();
        assert_eq!(out, b"'2024-03-05 07:08:09.500000'");
    }

    #[test]
    fn test_encode_text_duration() {
        let mut out = Vec::new();
        let delta = -(TimeDelta::new(100 * 3600 + 5, 0).unwrap());
        encode_text(&Value::Duration(delta), &mut out).unwrap();
        assert_eq!(out, b"'-100:00:05'");
    }
}
