//! Control socket framing
//!
//! The control endpoint is a byte stream, so each request carries a small
//! header in front of its body:
//!
//! ```text
//! Request:  +-------------+---------------+-----------+
//!           | msg_id: u32 | body_len: u32 | body ...  |
//!           +-------------+---------------+-----------+
//!
//! Reply:    +---------------+-----------+
//!           | body_len: u32 | body ...  |
//!           +---------------+-----------+
//! ```
//!
//! Replies are written only for requests whose kind has one.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{REPLY_HEADER_SIZE, REQUEST_HEADER_SIZE};
use super::message::ControlMessage;
use super::ProtocolError;

/// A framed control request, body not yet decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub msg_id: u32,
    pub body: Bytes,
}

/// Try to split one request frame off the front of `buf`.
///
/// Returns `Ok(None)` when more data is needed. A declared body larger than
/// `max_body` is an error; the stream cannot be resynchronized after it.
pub fn decode_request(
    buf: &mut BytesMut,
    max_body: usize,
) -> Result<Option<RequestFrame>, ProtocolError> {
    if buf.len() < REQUEST_HEADER_SIZE {
        return Ok(None);
    }

    let mut header = &buf[..REQUEST_HEADER_SIZE];
    let msg_id = header.get_u32_ne();
    let body_len = header.get_u32_ne() as usize;

    if body_len > max_body {
        return Err(ProtocolError::FrameTooLarge {
            len: body_len,
            max: max_body,
        });
    }

    if buf.len() < REQUEST_HEADER_SIZE + body_len {
        buf.reserve(REQUEST_HEADER_SIZE + body_len - buf.len());
        return Ok(None);
    }

    buf.advance(REQUEST_HEADER_SIZE);
    let body = buf.split_to(body_len).freeze();

    Ok(Some(RequestFrame { msg_id, body }))
}

/// Frame a raw request
pub fn encode_request(msg_id: u32, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(REQUEST_HEADER_SIZE + body.len());
    buf.put_u32_ne(msg_id);
    buf.put_u32_ne(body.len() as u32);
    buf.put_slice(body);
    buf.freeze()
}

/// Frame a control message
pub fn encode_message(message: &ControlMessage) -> Bytes {
    encode_request(message.kind().id(), &message.encode_body())
}

/// Try to split one reply off the front of `buf`
pub fn decode_reply(buf: &mut BytesMut, max_body: usize) -> Result<Option<Bytes>, ProtocolError> {
    if buf.len() < REPLY_HEADER_SIZE {
        return Ok(None);
    }

    let mut header = &buf[..REPLY_HEADER_SIZE];
    let body_len = header.get_u32_ne() as usize;
    if body_len > max_body {
        return Err(ProtocolError::FrameTooLarge {
            len: body_len,
            max: max_body,
        });
    }

    if buf.len() < REPLY_HEADER_SIZE + body_len {
        return Ok(None);
    }

    buf.advance(REPLY_HEADER_SIZE);
    Ok(Some(buf.split_to(body_len).freeze()))
}

/// Frame a reply body
pub fn encode_reply(body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(REPLY_HEADER_SIZE + body.len());
    buf.put_u32_ne(body.len() as u32);
    buf.put_slice(body);
    buf.freeze()
}
