//! Inter-process broadcast hub for spied MIDI traffic
//!
//! A MIDI spying driver captures the traffic sent to its destinations and
//! hands each captured batch to a [`Broadcaster`]. Listener processes attach
//! to the hub over a local control socket, subscribe to the channels (spied
//! destinations) they care about, and receive every batch for those
//! channels as a datagram.
//!
//! ```no_run
//! use std::sync::Arc;
//! use midi_spy_hub::{Broadcaster, ControlServer, HubConfig, UnixTransport};
//!
//! # async fn example() -> midi_spy_hub::error::Result<()> {
//! let config = HubConfig::new("midi-spy").socket_dir("/tmp");
//! let (hub, monitor) = Broadcaster::new(&config, UnixTransport::new(&config.socket_dir));
//! monitor.spawn();
//!
//! let server = ControlServer::bind(config, Arc::clone(&hub))?;
//!
//! // From the capture thread:
//! let producer = Arc::clone(&hub);
//! std::thread::spawn(move || {
//!     producer.broadcast(&[0x90, 0x40, 0x7F], 0);
//! });
//!
//! server.run().await
//! # }
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;
pub mod transport;

pub use endpoint::{EndpointKey, InvalidationNotifier, ListenerEndpoint, RemoteEndpoint};
pub use error::{Error, Result};
pub use hub::{Broadcaster, BroadcasterDelegate, LifecycleMonitor};
pub use protocol::ControlMessage;
pub use registry::{Channel, ListenerId};
pub use server::HubConfig;
pub use stats::HubStats;
pub use transport::{MemoryReceiver, MemoryTransport, Transport};

#[cfg(unix)]
pub use client::SpyListener;
#[cfg(unix)]
pub use server::ControlServer;
#[cfg(unix)]
pub use transport::UnixTransport;
