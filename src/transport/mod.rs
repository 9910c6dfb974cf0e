//! IPC transports
//!
//! A transport turns an endpoint name into a [`ListenerEndpoint`] the hub
//! can send to. Two are provided:
//!
//! - [`UnixTransport`]: listener endpoints are Unix datagram sockets in a
//!   shared directory, one file per `<hub>-<id>` name.
//! - [`MemoryTransport`]: in-process queues, for tests and for embedding the
//!   hub without sockets.

pub mod memory;
#[cfg(unix)]
pub mod unix;

pub use memory::{MemoryReceiver, MemoryTransport};
#[cfg(unix)]
pub use unix::UnixTransport;

use crate::endpoint::ListenerEndpoint;
use crate::error::TransportError;

/// Opens remote listener endpoints by name
pub trait Transport: Send + Sync {
    /// Open the endpoint a listener published under `name`.
    ///
    /// Fails if nothing is published under that name, e.g. because the
    /// listener exited before the hub connected back.
    fn open_remote(&self, name: &str) -> Result<ListenerEndpoint, TransportError>;
}
