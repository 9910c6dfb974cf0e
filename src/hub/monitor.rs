//! Endpoint lifecycle monitor
//!
//! Transports report dead endpoints through their [`InvalidationNotifier`]
//! (see [`crate::endpoint::InvalidationNotifier`]). The notifications queue up
//! here and are applied to the hub outside of whatever context raised them,
//! which may be the producer thread in the middle of a broadcast.

use std::sync::Weak;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Broadcaster;
use crate::endpoint::EndpointKey;

/// Removes invalidated listeners from a [`Broadcaster`]
#[derive(Debug)]
pub struct LifecycleMonitor {
    hub: Weak<Broadcaster>,
    rx: mpsc::UnboundedReceiver<EndpointKey>,
}

impl LifecycleMonitor {
    pub(super) fn new(hub: Weak<Broadcaster>, rx: mpsc::UnboundedReceiver<EndpointKey>) -> Self {
        Self { hub, rx }
    }

    /// Apply invalidations until the hub is dropped
    pub async fn run(mut self) {
        while let Some(key) = self.rx.recv().await {
            let Some(hub) = self.hub.upgrade() else {
                break;
            };
            hub.remove_listener(key);
        }

        tracing::debug!("Lifecycle monitor stopped");
    }

    /// Run the monitor as a tokio task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Apply every invalidation queued so far without waiting.
    ///
    /// For hosts that drive the hub without a runtime. Returns the number
    /// of notifications processed.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;

        while let Ok(key) = self.rx.try_recv() {
            let Some(hub) = self.hub.upgrade() else {
                break;
            };
            hub.remove_listener(key);
            processed += 1;
        }

        processed
    }
}
