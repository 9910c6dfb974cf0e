//! Listener count notifications
//!
//! The driver only needs to capture MIDI traffic while someone is listening.
//! The hub reports when its listener count leaves and returns to zero.
//! Callbacks are never invoked with the hub lock held, so a delegate may
//! query the hub. They are delivered one at a time and always alternate;
//! a delegate must not add or remove listeners from inside a callback.

/// Receives listener count transitions from a [`super::Broadcaster`]
pub trait BroadcasterDelegate: Send + Sync {
    /// The first listener was registered
    fn listener_count_became_nonzero(&self);

    /// The last listener was removed
    fn listener_count_became_zero(&self);
}
