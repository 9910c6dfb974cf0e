//! Broadcast hub
//!
//! ```text
//!  listener processes                 hub                       driver
//!  ┌──────────────┐  control   ┌──────────────────┐  broadcast  ┌──────────┐
//!  │ SpyListener  │ ─────────► │   Broadcaster    │ ◄────────── │ producer │
//!  │              │ ◄───────── │ registry + table │             └──────────┘
//!  └──────────────┘  datagrams └────────▲─────────┘
//!                                       │ invalidations
//!                              ┌────────┴─────────┐
//!                              │ LifecycleMonitor │
//!                              └──────────────────┘
//! ```
//!
//! The hub is shared as `Arc<Broadcaster>`; every component that needs it
//! is handed a reference at construction.

pub mod broadcaster;
pub mod delegate;
pub mod monitor;

pub use broadcaster::Broadcaster;
pub use delegate::BroadcasterDelegate;
pub use monitor::LifecycleMonitor;
