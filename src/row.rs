//! Lazily decoded result row.
//!
//! A [`Row`] keeps the undecoded payload and finds column values on demand. Moving forward
//! continues from the current column. Moving backward rescans from the first column.

use std::sync::Arc;

use crate::codec::{self, DecodeContext, FromValue, HostType, Protocol, Value};
use crate::constant::BinaryLayout;
use crate::error::{Error, Result, eyre};
use crate::nightly::unlikely;
use crate::protocol::column_definition::ColumnDefinitions;
use crate::protocol::primitive::{read_int_1, read_lenenc};
use crate::protocol::value::NullBitmap;

/// Where the cursor is within the row payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ScanState {
    /// Column under the cursor. `None` before the first positioning.
    index: Option<usize>,
    /// Offset of the current value
    pos: usize,
    /// Length of the current value. `None` for NULL.
    length: Option<usize>,
    /// Offset of the first column's value
    start: usize,
}

#[derive(Debug, Clone)]
pub struct Row {
    payload: Vec<u8>,
    columns: Arc<ColumnDefinitions>,
    ctx: DecodeContext,
    scan: ScanState,
}

impl Row {
    /// Wrap a row packet payload.
    ///
    /// Binary rows must start with the 0x00 header followed by the NULL bitmap.
    pub fn new(payload: Vec<u8>, columns: Arc<ColumnDefinitions>, ctx: DecodeContext) -> Result<Self> {
        let start = match ctx.protocol {
            Protocol::Text => 0,
            Protocol::Binary => {
                let (header, _) = read_int_1(&payload)?;
                if header != 0x00 {
                    return Err(Error::UnexpectedPacket {
                        state: "reading a binary row",
                        byte: header,
                    });
                }
                let start = 1 + NullBitmap::result_set_len(columns.len());
                if payload.len() < start {
                    return Err(Error::UnexpectedEof);
                }
                start
            }
        };
        Ok(Self {
            payload,
            columns,
            ctx,
            scan: ScanState {
                start,
                pos: start,
                ..Default::default()
            },
        })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &Arc<ColumnDefinitions> {
        &self.columns
    }

    pub fn protocol(&self) -> Protocol {
        self.ctx.protocol
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn null_bitmap(&self) -> NullBitmap<'_> {
        let bitmap = self.payload.get(1..self.scan.start).unwrap_or_default();
        NullBitmap::for_result_set(bitmap)
    }

    /// Length and offset of the value of column `index` whose encoding starts at `at`
    fn measure(&self, index: usize, at: usize) -> Result<(Option<usize>, usize)> {
        let data = self.payload.get(at..).ok_or(Error::UnexpectedEof)?;
        let (length, value_pos) = match self.ctx.protocol {
            Protocol::Binary if self.null_bitmap().is_null(index) => return Ok((None, at)),
            Protocol::Binary => {
                let column = self.columns.get(index).ok_or(Error::InvalidPacket)?;
                match column.column_type.binary_layout() {
                    BinaryLayout::Fixed(n) => (Some(n), at),
                    BinaryLayout::LengthByte => {
                        let (len, _) = read_int_1(data)?;
                        (Some(len as usize), at + 1)
                    }
                    BinaryLayout::Lenenc => lenenc(data, at)?,
                }
            }
            Protocol::Text => lenenc(data, at)?,
        };
        if let Some(len) = length {
            if unlikely(value_end(value_pos, len)? > self.payload.len()) {
                return Err(Error::UnexpectedEof);
            }
        }
        Ok((length, value_pos))
    }

    /// Move the cursor to column `index`.
    ///
    /// Moving to a column at or before the current one rescans from the start of the row.
    pub fn position(&mut self, index: usize) -> Result<()> {
        if unlikely(index >= self.columns.len()) {
            return Err(Error::BadUsageError(format!(
                "column index {index} is out of range for {} columns",
                self.columns.len()
            )));
        }
        let (mut next, first) = match self.scan.index {
            Some(current) if current < index => (
                value_end(self.scan.pos, self.scan.length.unwrap_or(0))?,
                current + 1,
            ),
            _ => (self.scan.start, 0),
        };
        for i in first..=index {
            let (length, pos) = self.measure(i, next)?;
            self.scan.index = Some(i);
            self.scan.pos = pos;
            self.scan.length = length;
            next = value_end(pos, length.unwrap_or(0))?;
        }
        Ok(())
    }

    /// Raw bytes of column `index`, `None` for NULL
    pub fn raw(&mut self, index: usize) -> Result<Option<&[u8]>> {
        self.position(index)?;
        let Some(length) = self.scan.length else {
            return Ok(None);
        };
        let pos = self.scan.pos;
        self.payload
            .get(pos..value_end(pos, length)?)
            .map(Some)
            .ok_or(Error::UnexpectedEof)
    }

    pub fn is_null(&mut self, index: usize) -> Result<bool> {
        self.position(index)?;
        Ok(self.scan.length.is_none())
    }

    /// Decode column `index` as `host`. NULL is returned as `Value::Null`.
    pub fn get_value(&mut self, index: usize, host: HostType) -> Result<Value> {
        self.position(index)?;
        let Some(length) = self.scan.length else {
            return Ok(Value::Null);
        };
        let column = self.columns.get(index).ok_or(Error::InvalidPacket)?;
        let pos = self.scan.pos;
        let bytes = self
            .payload
            .get(pos..value_end(pos, length)?)
            .ok_or(Error::UnexpectedEof)?;
        codec::decode(index, column, host, bytes, self.ctx)
    }

    /// Decode column `index` as `T`.
    ///
    /// NULL is only accepted by nullable `T` such as `Option<_>`.
    pub fn get<T: FromValue>(&mut self, index: usize) -> Result<T> {
        let value = self.get_value(index, T::HOST_TYPE)?;
        if value.is_null() && !T::NULLABLE {
            return Err(Error::UnexpectedNull {
                index,
                host: T::HOST_TYPE,
            });
        }
        let host = value.host_type();
        T::from_value(value).ok_or_else(|| {
            Error::LibraryBug(eyre!(
                "column {index} decoded as {host:?} instead of {:?}",
                T::HOST_TYPE
            ))
        })
    }

    /// Decode the column whose alias is `name`, ignoring ASCII case
    pub fn get_by_name<T: FromValue>(&mut self, name: &str) -> Result<T> {
        let index = self
            .columns
            .index_of(name)
            .ok_or_else(|| Error::BadUsageError(format!("no column named '{name}'")))?;
        self.get(index)
    }
}

/// A declared length may run past the end of the address space
fn value_end(pos: usize, length: usize) -> Result<usize> {
    pos.checked_add(length).ok_or(Error::UnexpectedEof)
}

fn lenenc(data: &[u8], at: usize) -> Result<(Option<usize>, usize)> {
    let (length, rest) = read_lenenc(data)?;
    let value_pos = at + (data.len() - rest.len());
    let length = length
        .map(|len| usize::try_from(len).map_err(|_| Error::UnexpectedEof))
        .transpose()?;
    Ok((length, value_pos))
}
