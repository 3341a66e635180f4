pub mod auth;
pub mod column_definition;
pub mod command;
pub mod decoder;
pub mod packet;
pub mod primitive;
pub mod response;
pub mod value;


pub use decoder::{CollectHandler, Decoded, DecoderState, ResponseDecoder, ResponseHandler, ServerMessage};
