//! Wire protocol module.
//!
//! Defines request/response types and message framing for the RPC socket.
//!
//! ## Wire Format
//!
//! Messages are length-prefixed JSON:
//! ```text
//! [4 bytes: length (big-endian u32)][JSON payload]
//! ```
//!
//! The credential travels in the request's `metadata.authorization` field,
//! either raw or as `Bearer <secret>`.

mod request;
mod response;
mod wire;

pub use request::{RpcRequest, AUTHORIZATION_KEY};
pub use response::{codes, ErrorResponse, Response};
pub use wire::{
    read_message, read_message_with_timeout, write_message, write_message_with_timeout,
    DEFAULT_MAX_MESSAGE_SIZE,
};
