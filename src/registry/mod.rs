//! Listener and subscription bookkeeping
//!
//! The hub keeps two structures behind one lock:
//!
//! ```text
//!        ListenerRegistry                     ChannelTable
//!   ┌──────────────────────────┐     ┌──────────────────────────────┐
//!   │ ListenerId ──► Endpoint  │     │ Channel ──► [Endpoint, ...]  │
//!   │ EndpointKey ──► ListenerId│     │                              │
//!   └──────────────────────────┘     └──────────────────────────────┘
//! ```
//!
//! Control messages resolve a [`ListenerId`] to its endpoint through the
//! registry, then change the table. Broadcasts read only the table.
//! Invalidation goes the other way: endpoint key → identifier, then the
//! endpoint is swept out of both.

pub mod channel;
pub mod listener;

pub use channel::{Channel, ChannelTable};
pub use listener::{ListenerId, ListenerRegistry};
