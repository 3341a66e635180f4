use crate::constant::{BINARY_CHARSET, ColumnFlags, ColumnType, UTF8MB4_GENERAL_CI};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Represents a payload part of a column definition packet
#[derive(Debug, Clone, Copy)]
pub struct ColumnDefinitionBytes<'a>(pub &'a [u8]);

/// Fixed-size tail of Column Definition packet (12 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct ColumnDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

impl ColumnDefinitionTail {
    pub fn charset(&self) -> u16 {
        self.charset.get()
    }

    pub fn column_length(&self) -> u32 {
        self.column_length.get()
    }

    pub fn column_type(&self) -> Result<ColumnType> {
        ColumnType::from_u8(self.column_type)
            .ok_or_else(|| Error::Unsupported(format!("column type 0x{:02X}", self.column_type)))
    }

    /// Unknown bits are kept so that newer servers do not fail the decode
    pub fn flags(&self) -> ColumnFlags {
        ColumnFlags::from_bits_retain(self.flags.get())
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

/// One result column, owned so it can be shared by every row of the result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub schema: String,
    pub table_alias: String,
    pub table_original: String,
    pub name_alias: String,
    pub name_original: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl ColumnDefinition {
    /// A definition that did not come off the wire. Character and blob columns get
    /// `utf8mb4_general_ci`, everything else the binary charset.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        let charset = if column_type.is_string() || column_type.is_blob() {
            UTF8MB4_GENERAL_CI
        } else {
            BINARY_CHARSET
        };
        Self {
            schema: String::new(),
            table_alias: String::new(),
            table_original: String::new(),
            name_alias: name.clone(),
            name_original: name,
            charset,
            column_length: 0,
            column_type,
            flags: ColumnFlags::empty(),
            decimals: 0,
        }
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_length(mut self, column_length: u32) -> Self {
        self.column_length = column_length;
        self
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    /// Binary collation: character columns carry raw bytes
    pub fn is_binary(&self) -> bool {
        self.charset == BINARY_CHARSET
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl TryFrom<ColumnDefinitionBytes<'_>> for ColumnDefinition {
    type Error = Error;

    fn try_from(bytes: ColumnDefinitionBytes<'_>) -> Result<Self> {
        let data = bytes.0;

        // ─── Variable Length String Fields ───────────────────────────
        let (_catalog, data) = read_string_lenenc(data)?;
        let (schema, data) = read_string_lenenc(data)?;
        let (table_alias, data) = read_string_lenenc(data)?;
        let (table_original, data) = read_string_lenenc(data)?;
        let (name_alias, data) = read_string_lenenc(data)?;
        let (name_original, data) = read_string_lenenc(data)?;

        // ─── ColumnDefinitionTail ────────────────────────────────────
        // length is always 0x0c
        let (_length, data) = read_int_lenenc(data)?;
        let (tail, _) =
            ColumnDefinitionTail::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;

        Ok(Self {
            schema: lossy(schema),
            table_alias: lossy(table_alias),
            table_original: lossy(table_original),
            name_alias: lossy(name_alias),
            name_original: lossy(name_original),
            charset: tail.charset(),
            column_length: tail.column_length(),
            column_type: tail.column_type()?,
            flags: tail.flags(),
            decimals: tail.decimals(),
        })
    }
}

/// Column definitions of one result set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDefinitions {
    definitions: Vec<ColumnDefinition>,
}

impl ColumnDefinitions {
    pub fn new(definitions: Vec<ColumnDefinition>) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &[ColumnDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnDefinition> {
        self.definitions.get(index)
    }

    /// Case-insensitive lookup by column alias
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.definitions
            .iter()
            .position(|col| col.name_alias.eq_ignore_ascii_case(name))
    }
}

impl From<Vec<ColumnDefinition>> for ColumnDefinitions {
    fn from(definitions: Vec<ColumnDefinition>) -> Self {
        Self::new(definitions)
    }
}
