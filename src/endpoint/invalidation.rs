//! Invalidation notification
//!
//! When the hub registers an endpoint it hands the endpoint an
//! [`InvalidationNotifier`]. The transport keeps it and calls
//! [`InvalidationNotifier::notify`] once it learns the endpoint is dead.
//! The notifier carries its endpoint's key and a queue back to the hub that
//! created it, so no process-wide lookup is needed and a transport may
//! notify from any thread, including from inside a broadcast.

use tokio::sync::mpsc;

use super::EndpointKey;

/// Per-endpoint token passed back to the hub on invalidation
#[derive(Debug, Clone)]
pub struct InvalidationNotifier {
    key: EndpointKey,
    tx: mpsc::UnboundedSender<EndpointKey>,
}

impl InvalidationNotifier {
    pub(crate) fn new(key: EndpointKey, tx: mpsc::UnboundedSender<EndpointKey>) -> Self {
        Self { key, tx }
    }

    /// Key of the endpoint this notifier belongs to
    pub fn key(&self) -> EndpointKey {
        self.key
    }

    /// Report the endpoint as no longer usable
    pub fn notify(&self) {
        if self.tx.send(self.key).is_err() {
            tracing::trace!(endpoint = %self.key, "Invalidation after hub shutdown");
        }
    }
}
