//! Hub process side
//!
//! [`HubConfig`] names the hub and its socket directory. [`ControlServer`]
//! accepts control streams from listener processes on
//! `<socket_dir>/<name>` and executes their requests against a shared
//! [`crate::hub::Broadcaster`].

pub mod config;
#[cfg(unix)]
pub mod connection;
#[cfg(unix)]
pub mod listener;

pub use config::HubConfig;
#[cfg(unix)]
pub use listener::ControlServer;
