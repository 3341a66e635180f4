//! MySQL/MariaDB response decoding and value codecs.
//!
//! Bytes read from a connection go into a [`ResponseDecoder`], which frames packets and
//! yields column definitions, lazily decoded [`Row`]s and terminators one at a time. The
//! [`codec`] module converts column values to Rust types and bound parameters to wire bytes.

pub mod buffer;
pub mod buffer_pool;
pub mod codec;
pub mod constant;
pub mod error;
mod nightly;
mod opts;
pub mod protocol;
pub mod row;

pub use buffer::BufferSet;
pub use codec::{BindValue, FromValue, HostType, Parameter, Protocol, SqlType, Value};
pub use opts::Opts;
pub use protocol::{Decoded, ResponseDecoder, ResponseHandler, ServerMessage};
pub use row::Row;
