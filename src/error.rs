//! Error types
//!
//! The hub itself never surfaces errors to the producer thread. These types
//! are used at the edges: binding the control socket, opening listener
//! endpoints, and by the listener client.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying socket or filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opening or using a remote endpoint failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Control protocol violation
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid configuration value
    #[error("invalid config: {0}")]
    Config(String),

    /// A request did not complete in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

/// Failure to open a remote listener endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    /// No endpoint is published under the given name
    #[error("no endpoint named {0:?}")]
    EndpointNotFound(String),

    /// The endpoint exists but could not be connected
    #[error("failed to connect to {path:?}: {source}")]
    Connect {
        /// Socket path that was attempted
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Outcome of a failed best-effort send
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport did not accept the data before the deadline
    #[error("send timed out")]
    Timeout,

    /// The remote endpoint no longer exists
    #[error("endpoint invalidated")]
    Invalidated,

    /// Any other transport failure
    #[error("send failed: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for fallible crate operations
pub type Result<T> = std::result::Result<T, Error>;
