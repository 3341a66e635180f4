use std::io::Cursor;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;

/// Host representation requested from, or supplied to, the codec registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    /// Natural decode: the column's wire type picks the codec
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    String,
    Bytes,
    BitSet,
    Date,
    Time,
    DateTime,
    Duration,
    Stream,
}

/// Bits of a BIT(n) column.
///
/// Bit `i` is stored in `bytes[i / 8]` at position `i % 8`, i.e. the wire bytes reversed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSet {
    bytes: Vec<u8>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the big-endian bytes sent by the server
    pub fn from_wire(wire: &[u8]) -> Self {
        let mut bytes: Vec<u8> = wire.iter().rev().copied().collect();
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Self { bytes }
    }

    /// Big-endian bytes as expected by the server, at least one byte long
    pub fn to_wire(&self) -> Vec<u8> {
        if self.bytes.is_empty() {
            return vec![0];
        }
        self.bytes.iter().rev().copied().collect()
    }

    pub fn get(&self, bit: usize) -> bool {
        self.bytes
            .get(bit >> 3)
            .is_some_and(|byte| byte & (1 << (bit & 7)) != 0)
    }

    pub fn set(&mut self, bit: usize, on: bool) {
        let idx = bit >> 3;
        if idx >= self.bytes.len() {
            if !on {
                return;
            }
            self.bytes.resize(idx + 1, 0);
        }
        if on {
            self.bytes[idx] |= 1 << (bit & 7);
        } else {
            self.bytes[idx] &= !(1 << (bit & 7));
            while self.bytes.last() == Some(&0) {
                self.bytes.pop();
            }
        }
    }

    /// One past the highest set bit
    pub fn len(&self) -> usize {
        match self.bytes.last() {
            Some(&last) => (self.bytes.len() - 1) * 8 + (8 - last.leading_zeros() as usize),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An owned host value, decoded from a column or bound as a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    BitSet(BitSet),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
    Stream(Cursor<Vec<u8>>),
}

impl Value {
    /// `HostType::Any` for `Null`
    pub fn host_type(&self) -> HostType {
        match self {
            Value::Null => HostType::Any,
            Value::Bool(_) => HostType::Bool,
            Value::I8(_) => HostType::I8,
            Value::I16(_) => HostType::I16,
            Value::I32(_) => HostType::I32,
            Value::I64(_) => HostType::I64,
            Value::I128(_) => HostType::I128,
            Value::U8(_) => HostType::U8,
            Value::U16(_) => HostType::U16,
            Value::U32(_) => HostType::U32,
            Value::U64(_) => HostType::U64,
            Value::F32(_) => HostType::F32,
            Value::F64(_) => HostType::F64,
            Value::Decimal(_) => HostType::Decimal,
            Value::String(_) => HostType::String,
            Value::Bytes(_) => HostType::Bytes,
            Value::BitSet(_) => HostType::BitSet,
            Value::Date(_) => HostType::Date,
            Value::Time(_) => HostType::Time,
            Value::DateTime(_) => HostType::DateTime,
            Value::Duration(_) => HostType::Duration,
            Value::Stream(_) => HostType::Stream,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Conversion from a decoded [`Value`] into a Rust type.
///
/// `HOST_TYPE` selects the codec. Only nullable implementations accept `Value::Null`.
pub trait FromValue: Sized {
    const HOST_TYPE: HostType;
    const NULLABLE: bool = false;

    /// `None` if the value has a different variant
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
    const HOST_TYPE: HostType = HostType::Any;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const HOST_TYPE: HostType = T::HOST_TYPE;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            value => T::from_value(value).map(Some),
        }
    }
}

macro_rules! impl_host_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                const HOST_TYPE: HostType = HostType::$variant;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_host_value! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    BitSet => BitSet,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    TimeDelta => Duration,
    Cursor<Vec<u8>> => Stream,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
