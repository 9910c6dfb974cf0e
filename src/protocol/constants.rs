//! Control protocol constants

use std::time::Duration;

/// Request a fresh listener identifier
pub const MSG_GET_NEXT_LISTENER_IDENTIFIER: u32 = 0;
/// Announce a listener whose reply endpoint is now published
pub const MSG_ADD_LISTENER: u32 = 1;
/// Subscribe a listener to a channel
pub const MSG_CONNECT_CHANNEL: u32 = 2;
/// Unsubscribe a listener from a channel
pub const MSG_DISCONNECT_CHANNEL: u32 = 3;

/// Size of an encoded listener identifier
pub const IDENTIFIER_SIZE: usize = 4;
/// Size of an encoded channel number
pub const CHANNEL_SIZE: usize = 4;

/// Request frame header: message id + body length
pub const REQUEST_HEADER_SIZE: usize = 8;
/// Reply frame header: body length
pub const REPLY_HEADER_SIZE: usize = 4;

/// Largest control frame body accepted by default
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// How long a single broadcast send may wait for the transport
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(300);

/// Name used when a hub is created without one
pub const UNKNOWN_BROADCASTER_NAME: &str = "Unknown Broadcaster";

/// Default hub name for the daemon
pub const DEFAULT_BROADCASTER_NAME: &str = "midi-spy";

/// Largest datagram a listener expects to receive
pub const MAX_BROADCAST_SIZE: usize = 64 * 1024;
