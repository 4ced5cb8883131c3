//! ## VSOA (Vehicle Service-Oriented Architecture) wire codec
//!
//! VSOA is a duplex client/server protocol combining a reliable TCP "normal
//! channel" and an unreliable UDP "quick channel" under one framed binary
//! format. This crate owns the wire format only: header layout, message
//! framing, the buffer pool, and the handshake/position JSON payloads shared
//! by client and server. Connection state machines and routing live in
//! `vsoa-service` and `vsoa-client`.

pub mod channel;
pub mod message;
pub mod pool;
pub mod position;
pub mod routing;
pub mod servinfo;

use std::str::Utf8Error;

pub use message::{Header, Message, MessageType, RpcMethod, StatusType};
pub use pool::BufferPool;

#[derive(Debug)]
pub enum Error {
    /// The magic/version byte did not match `0x29`.
    BadMagic,
    /// Framed length was not a multiple of 4.
    UnPad,
    /// Framed length exceeded the channel's message size limit.
    TooLong,
    /// A numeric field (type, status, rpc method) held an unknown value.
    InvalidField,
    Utf8Error(Utf8Error),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
