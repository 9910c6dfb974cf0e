//! Counters and snapshots for the broadcast hub

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Running counters updated by the hub
///
/// Updated with relaxed atomics from both the control thread and the
/// producer thread; values are advisory.
#[derive(Debug)]
pub struct HubCounters {
    started_at: Instant,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    failed_sends: AtomicU64,
    timed_out_sends: AtomicU64,
    listeners_added: AtomicU64,
    listeners_removed: AtomicU64,
    dropped_requests: AtomicU64,
}

impl HubCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            failed_sends: AtomicU64::new(0),
            timed_out_sends: AtomicU64::new(0),
            listeners_added: AtomicU64::new(0),
            listeners_removed: AtomicU64::new(0),
            dropped_requests: AtomicU64::new(0),
        }
    }

    pub fn record_broadcast(&self, delivered: u64, failed: u64, timed_out: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.failed_sends.fetch_add(failed, Ordering::Relaxed);
        self.timed_out_sends.fetch_add(timed_out, Ordering::Relaxed);
    }

    pub fn record_listener_added(&self) {
        self.listeners_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listener_removed(&self) {
        self.listeners_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_request(&self) {
        self.dropped_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine the counters with the current table sizes
    pub fn snapshot(&self, listeners: usize, channels: usize, subscriptions: usize) -> HubStats {
        HubStats {
            listeners,
            channels,
            subscriptions,
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_sends: self.failed_sends.load(Ordering::Relaxed),
            timed_out_sends: self.timed_out_sends.load(Ordering::Relaxed),
            listeners_added: self.listeners_added.load(Ordering::Relaxed),
            listeners_removed: self.listeners_removed.load(Ordering::Relaxed),
            dropped_requests: self.dropped_requests.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for HubCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the hub
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Registered listeners
    pub listeners: usize,
    /// Channels with at least one subscriber
    pub channels: usize,
    /// Memberships across all channels
    pub subscriptions: usize,
    /// `broadcast` calls
    pub broadcasts: u64,
    /// Successful sends to listeners
    pub deliveries: u64,
    /// Sends that failed for any reason (timeouts included)
    pub failed_sends: u64,
    /// Sends that hit the per-send timeout
    pub timed_out_sends: u64,
    /// Listeners ever registered
    pub listeners_added: u64,
    /// Listeners removed after invalidation or replacement
    pub listeners_removed: u64,
    /// Malformed or unknown control requests
    pub dropped_requests: u64,
    /// Time since the hub was created
    pub uptime: Duration,
}

impl HubStats {
    /// Fraction of sends that reached their listener (1.0 when nothing was sent)
    pub fn delivery_ratio(&self) -> f64 {
        let attempts = self.deliveries + self.failed_sends;
        if attempts > 0 {
            self.deliveries as f64 / attempts as f64
        } else {
            1.0
        }
    }
}
