use crate::constant::ServerStatusFlags;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Raw OK (0x00) or OK-as-terminator (0xFE) payload
#[derive(Debug)]
pub struct OkPayloadBytes<'a>(pub &'a [u8]);

/// Raw ERR (0xFF) payload
#[derive(Debug)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

/// OK packet, also used for the result-set terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
    pub info: String,
}

impl OkPayload {
    /// Normalize a legacy EOF packet into the OK shape
    pub fn from_eof(eof: &EofPacket) -> Self {
        Self {
            affected_rows: 0,
            last_insert_id: 0,
            status_flags: eof.status_flags(),
            warnings: eof.warnings.get(),
            info: String::new(),
        }
    }

    pub fn more_results_exist(&self) -> bool {
        self.status_flags
            .contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS)
    }
}

impl TryFrom<OkPayloadBytes<'_>> for OkPayload {
    type Error = Error;

    fn try_from(bytes: OkPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != 0x00 && header != 0xFE {
            return Err(Error::InvalidPacket);
        }

        let (affected_rows, rest) = read_int_lenenc(data)?;
        let (last_insert_id, rest) = read_int_lenenc(rest)?;
        let (status_flags, rest) = read_int_2(rest)?;
        let (warnings, info) = read_int_2(rest)?;

        // session state (CLIENT_SESSION_TRACK) is kept inside `info` undecoded
        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: ServerStatusFlags::from_bits_retain(status_flags),
            warnings,
            info: String::from_utf8_lossy(info).into_owned(),
        })
    }
}

/// ERR packet response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != 0xFF {
            return Err(Error::InvalidPacket);
        }

        let (error_code, data) = read_int_2(data)?;

        let (sql_state, rest) = match data.split_first() {
            Some((b'#', marked)) => {
                let (state, rest) = read_string_fix(marked, 5)?;
                (String::from_utf8_lossy(state).into_owned(), rest)
            }
            _ => (String::new(), data),
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
        })
    }
}

/// EOF packet body after the 0xFE header
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    pub warnings: U16LE,
    pub status_flags: U16LE,
}

impl EofPacket {
    pub fn status_flags(&self) -> ServerStatusFlags {
        ServerStatusFlags::from_bits_retain(self.status_flags.get())
    }
}

/// Read EOF packet (header byte 0xFE, length < 9)
pub fn read_eof_packet(payload: &[u8]) -> Result<&EofPacket> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }
    let (eof, _) = EofPacket::ref_from_prefix(data).map_err(|_| Error::UnexpectedEof)?;
    Ok(eof)
}

/// Whether a 0xFE payload has the complete shape of an OK packet
pub fn is_ok_shaped(payload: &[u8]) -> bool {
    OkPayload::try_from(OkPayloadBytes(payload)).is_ok()
}
