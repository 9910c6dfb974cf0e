//! Hub control protocol
//!
//! Listener processes talk to the hub through its named control endpoint
//! using four request kinds:
//!
//! ```text
//! Listener                                        Hub
//!    |---- GetNextIdentifier ----------------------->|
//!    |<--- id (u32) ---------------------------------|
//!    |     [publishes endpoint "<hub>-<id>"]         |
//!    |---- AddListener(id) ------------------------->|  opens "<hub>-<id>"
//!    |---- ConnectChannel(id, channel) ------------->|
//!    |<=== broadcast datagrams (one-way) ============|
//!    |---- DisconnectChannel(id, channel) ---------->|
//! ```
//!
//! Malformed requests are dropped without a reply.

pub mod constants;
pub mod frame;
pub mod message;

pub use frame::{decode_reply, decode_request, encode_message, encode_reply, RequestFrame};
pub use message::{decode_identifier_reply, encode_identifier_reply, ControlMessage, MessageKind};

use crate::registry::ListenerId;

/// Control protocol violation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Message id does not name a known request
    #[error("unknown message id {0}")]
    UnknownMessage(u32),

    /// Body length does not match the request kind
    #[error("{kind} body must be {expected} bytes, got {actual}")]
    BodyLength {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    /// Declared frame body exceeds the configured maximum
    #[error("frame body of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Name under which a listener publishes its receive endpoint
pub fn listener_endpoint_name(broadcaster_name: &str, id: ListenerId) -> String {
    format!("{}-{}", broadcaster_name, id)
}
