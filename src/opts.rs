use std::sync::Arc;

use smart_default::SmartDefault;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::codec::{DecodeContext, EncodeContext, Protocol};
use crate::constant::{CAPABILITIES_ALWAYS_ENABLED, CapabilityFlags};
use crate::error::Error;

/// Decoder and encoder configuration
///
/// ```rs
/// let mut opts1 = Opts::default();
/// opts1.tiny_int1_is_bool = false;
///
/// let opts2 = Opts::try_from("mysql://localhost/db?deprecate_eof=false")?;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Capabilities negotiated with the server.
    /// The response decoder only looks at `CLIENT_DEPRECATE_EOF`.
    #[default(CAPABILITIES_ALWAYS_ENABLED | CapabilityFlags::CLIENT_DEPRECATE_EOF)]
    pub capabilities: CapabilityFlags,

    /// `TINYINT(1)` columns decode naturally as `bool`
    #[default(true)]
    pub tiny_int1_is_bool: bool,

    /// The server runs with `NO_BACKSLASH_ESCAPES`
    pub no_backslash_escapes: bool,

    #[default(Arc::clone(&GLOBAL_BUFFER_POOL))]
    pub buffer_pool: Arc<BufferPool>,
}

impl Opts {
    pub fn deprecate_eof(&self) -> bool {
        self.capabilities
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    pub fn decode_context(&self, protocol: Protocol) -> DecodeContext {
        DecodeContext {
            protocol,
            tiny_int1_is_bool: self.tiny_int1_is_bool,
        }
    }

    pub fn encode_context(&self) -> EncodeContext {
        EncodeContext {
            no_backslash_escapes: self.no_backslash_escapes,
            buffer_pool: Arc::clone(&self.buffer_pool),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(Error::BadConfigError(format!(
            "Invalid value '{value}' for '{key}', expected true or false"
        ))),
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::BadConfigError(format!("Failed to parse MySQL URL: {}", e)))?;

        if parsed.scheme() != "mysql" && parsed.scheme() != "mariadb" {
            return Err(Error::BadConfigError(format!(
                "Invalid URL scheme '{}', expected 'mysql' or 'mariadb'",
                parsed.scheme()
            )));
        }

        let mut opts = Self::default();
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "deprecate_eof" => opts.capabilities.set(
                    CapabilityFlags::CLIENT_DEPRECATE_EOF,
                    parse_bool(&key, &value)?,
                ),
                "tiny_int1_is_bool" => opts.tiny_int1_is_bool = parse_bool(&key, &value)?,
                "no_backslash_escapes" => opts.no_backslash_escapes = parse_bool(&key, &value)?,
                _ => {
                    return Err(Error::BadConfigError(format!(
                        "Unknown URL parameter '{key}'"
                    )));
                }
            }
        }
        Ok(opts)
    }
}
