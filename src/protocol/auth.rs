use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::response::{ErrPayload, ErrPayloadBytes, OkPayload, OkPayloadBytes};

/// Name of the cleartext plugin
pub const MYSQL_CLEAR_PASSWORD: &str = "mysql_clear_password";

/// Write a `mysql_clear_password` response.
///
/// The password is sent NUL-terminated. No password is an empty payload.
pub fn write_clear_password(out: &mut Vec<u8>, password: Option<&str>) {
    if let Some(password) = password {
        write_string_null(out, password);
    }
}

/// Auth switch request from server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSwitchRequest<'a> {
    pub plugin_name: &'a [u8],
    pub plugin_data: &'a [u8],
}

/// Read auth switch request (0xFE with length >= 9)
pub fn read_auth_switch_request(payload: &[u8]) -> Result<AuthSwitchRequest<'_>> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }
    let (plugin_name, data) = read_string_null(data)?;
    // most plugins terminate their data with NUL
    let plugin_data = data.strip_suffix(&[0]).unwrap_or(data);
    Ok(AuthSwitchRequest {
        plugin_name,
        plugin_data,
    })
}

/// Server reply to an authentication packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResponse<'a> {
    Ok(OkPayload),
    Err(ErrPayload),
    AuthSwitch(AuthSwitchRequest<'a>),
    /// Plugin-specific data (0x01 header)
    MoreData(&'a [u8]),
}

pub fn read_auth_response(payload: &[u8]) -> Result<AuthResponse<'_>> {
    match payload.first() {
        Some(0x00) => Ok(AuthResponse::Ok(OkPayload::try_from(OkPayloadBytes(payload))?)),
        Some(0xFF) => Ok(AuthResponse::Err(ErrPayload::try_from(ErrPayloadBytes(
            payload,
        ))?)),
        Some(0xFE) => Ok(AuthResponse::AuthSwitch(read_auth_switch_request(payload)?)),
        Some(0x01) => Ok(AuthResponse::MoreData(&payload[1..])),
        Some(&byte) => Err(Error::UnexpectedPacket {
            state: "awaiting an authentication result",
            byte,
        }),
        None => Err(Error::InvalidPacket),
    }
}
