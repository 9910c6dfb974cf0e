//! Listener client
//!
//! Attaches a process to a running hub and receives the broadcasts for the
//! channels it connects to.

pub mod config;
#[cfg(unix)]
pub mod listener;

pub use config::ClientConfig;
#[cfg(unix)]
pub use listener::SpyListener;
