//! Control message decoding
//!
//! Every control request is a message id plus a fixed-layout body:
//!
//! ```text
//! GetNextIdentifier   (empty)
//! AddListener         +------------+
//!                     | id: u32    |
//!                     +------------+
//! Connect/Disconnect  +------------+-------------+
//!                     | id: u32    | channel: i32|
//!                     +------------+-------------+
//! ```
//!
//! Integers are in host byte order; both ends of the socket share a host.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::ProtocolError;
use crate::registry::{Channel, ListenerId};

/// Kind of control message, identified by its message id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    GetNextIdentifier,
    AddListener,
    ConnectChannel,
    DisconnectChannel,
}

impl MessageKind {
    pub fn from_id(msg_id: u32) -> Option<Self> {
        match msg_id {
            MSG_GET_NEXT_LISTENER_IDENTIFIER => Some(MessageKind::GetNextIdentifier),
            MSG_ADD_LISTENER => Some(MessageKind::AddListener),
            MSG_CONNECT_CHANNEL => Some(MessageKind::ConnectChannel),
            MSG_DISCONNECT_CHANNEL => Some(MessageKind::DisconnectChannel),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            MessageKind::GetNextIdentifier => MSG_GET_NEXT_LISTENER_IDENTIFIER,
            MessageKind::AddListener => MSG_ADD_LISTENER,
            MessageKind::ConnectChannel => MSG_CONNECT_CHANNEL,
            MessageKind::DisconnectChannel => MSG_DISCONNECT_CHANNEL,
        }
    }

    /// Exact body length this kind must carry
    pub fn body_len(self) -> usize {
        match self {
            MessageKind::GetNextIdentifier => 0,
            MessageKind::AddListener => IDENTIFIER_SIZE,
            MessageKind::ConnectChannel | MessageKind::DisconnectChannel => {
                IDENTIFIER_SIZE + CHANNEL_SIZE
            }
        }
    }

    /// Whether the hub answers this kind with a reply
    pub fn has_reply(self) -> bool {
        self == MessageKind::GetNextIdentifier
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::GetNextIdentifier => "GetNextIdentifier",
            MessageKind::AddListener => "AddListener",
            MessageKind::ConnectChannel => "ConnectChannel",
            MessageKind::DisconnectChannel => "DisconnectChannel",
        };
        f.write_str(name)
    }
}

/// A decoded control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Client is starting up and needs an identifier to name its endpoint
    GetNextIdentifier,
    /// Client has published `<hub>-<id>` and wants broadcasts sent there
    AddListener { id: ListenerId },
    /// Start receiving broadcasts for a channel
    ConnectChannel { id: ListenerId, channel: Channel },
    /// Stop receiving broadcasts for a channel
    DisconnectChannel { id: ListenerId, channel: Channel },
}

impl ControlMessage {
    /// Decode a request body for the given message id.
    ///
    /// The body length must match the kind exactly.
    pub fn decode(msg_id: u32, body: &[u8]) -> Result<Self, ProtocolError> {
        let kind = MessageKind::from_id(msg_id).ok_or(ProtocolError::UnknownMessage(msg_id))?;

        if body.len() != kind.body_len() {
            return Err(ProtocolError::BodyLength {
                kind,
                expected: kind.body_len(),
                actual: body.len(),
            });
        }

        let mut buf = body;
        let message = match kind {
            MessageKind::GetNextIdentifier => ControlMessage::GetNextIdentifier,
            MessageKind::AddListener => ControlMessage::AddListener {
                id: ListenerId::new(buf.get_u32_ne()),
            },
            MessageKind::ConnectChannel => ControlMessage::ConnectChannel {
                id: ListenerId::new(buf.get_u32_ne()),
                channel: Channel::new(buf.get_i32_ne()),
            },
            MessageKind::DisconnectChannel => ControlMessage::DisconnectChannel {
                id: ListenerId::new(buf.get_u32_ne()),
                channel: Channel::new(buf.get_i32_ne()),
            },
        };

        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ControlMessage::GetNextIdentifier => MessageKind::GetNextIdentifier,
            ControlMessage::AddListener { .. } => MessageKind::AddListener,
            ControlMessage::ConnectChannel { .. } => MessageKind::ConnectChannel,
            ControlMessage::DisconnectChannel { .. } => MessageKind::DisconnectChannel,
        }
    }

    /// Encode the request body (without framing)
    pub fn encode_body(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.kind().body_len());

        match *self {
            ControlMessage::GetNextIdentifier => {}
            ControlMessage::AddListener { id } => {
                buf.put_u32_ne(id.get());
            }
            ControlMessage::ConnectChannel { id, channel }
            | ControlMessage::DisconnectChannel { id, channel } => {
                buf.put_u32_ne(id.get());
                buf.put_i32_ne(channel.get());
            }
        }

        buf.freeze()
    }
}

/// Encode the reply to `GetNextIdentifier`
pub fn encode_identifier_reply(id: ListenerId) -> Bytes {
    Bytes::copy_from_slice(&id.get().to_ne_bytes())
}

/// Decode the reply to `GetNextIdentifier`
pub fn decode_identifier_reply(body: &[u8]) -> Result<ListenerId, ProtocolError> {
    if body.len() != IDENTIFIER_SIZE {
        return Err(ProtocolError::BodyLength {
            kind: MessageKind::GetNextIdentifier,
            expected: IDENTIFIER_SIZE,
            actual: body.len(),
        });
    }

    let mut buf = body;
    Ok(ListenerId::new(buf.get_u32_ne()))
}
