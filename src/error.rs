use thiserror::Error;

use crate::codec::HostType;
use crate::constant::ColumnType;
use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

pub use color_eyre::eyre::eyre;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Packet out of order: expected sequence {expected}, got {actual}")]
    PacketOutOfOrder { expected: u8, actual: u8 },

    #[error("Unexpected packet 0x{byte:02X} while {state}")]
    UnexpectedPacket { state: &'static str, byte: u8 },

    #[error("No decoder for column {index} of type {column_type:?} as {host:?}")]
    NoDecoder {
        index: usize,
        column_type: ColumnType,
        host: HostType,
    },

    #[error("No encoder for {host:?} (parameter at index {index})")]
    NoEncoder { index: usize, host: HostType },

    #[error("Cannot return NULL for non-nullable {host:?} (column {index})")]
    UnexpectedNull { index: usize, host: HostType },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
