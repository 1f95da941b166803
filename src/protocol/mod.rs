//! PostgreSQL frontend (client to server) wire protocol decoding.
//!
//! This module provides low-level primitives for:
//! - Reading length prefixes, bytes, and C-strings from a buffer ([`cursor`])
//! - Decoding individual frontend messages ([`messages`])
//! - Dispatching tagged messages by type byte ([`frontend`])
//! - Reading whole frames from, and writing messages to, async streams ([`framing`])
//!
//! # Wire Protocol Overview
//!
//! After startup, each frontend message consists of:
//! - 1 byte: message type tag
//! - 4 bytes: message length (including these 4 bytes)
//! - N bytes: message payload
//!
//! Exception: the first packet on a connection (StartupMessage, SSLRequest,
//! GSSENCRequest, CancelRequest) omits the type tag. The first int32 after
//! the length tells them apart.
//!
//! # Malformed input
//!
//! Decoders return `Result`. The dispatcher applies a
//! [`DecodePolicy`](crate::config::DecodePolicy): by default a body that fails
//! to decode becomes its message's default value, so one corrupt message does
//! not end the read loop.

pub mod cursor;
pub mod framing;
pub mod frontend;
pub mod messages;

pub use cursor::{Frame, read_byte, read_cstring, read_int32, read_int32_delim_message};
pub use frontend::{
    FrontendMessage, MessageReader, MessageTag, Phase, read_message, read_message_with,
};
pub use messages::{
    CancelRequest, FrontendBody, PROTOCOL_VERSION_3, PasswordMessage, QueryMessage,
    SslRequest, StartupMessage, StartupPacket, Terminate,
};
