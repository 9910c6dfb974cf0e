//! Broadcast hub
//!
//! [`Broadcaster`] owns the listener registry and the channel table behind a
//! single lock, executes control requests against them, and fans broadcast
//! data out to the subscribers of a channel.
//!
//! Two threads use it: the control side (control server connections and
//! the lifecycle monitor) and the producer that calls [`Broadcaster::broadcast`]
//! for every captured batch.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::delegate::BroadcasterDelegate;
use super::monitor::LifecycleMonitor;
use crate::endpoint::{EndpointKey, InvalidationNotifier};
use crate::error::SendError;
use crate::protocol::{encode_identifier_reply, listener_endpoint_name, ControlMessage};
use crate::registry::{Channel, ChannelTable, ListenerId, ListenerRegistry};
use crate::server::HubConfig;
use crate::stats::{HubCounters, HubStats};
use crate::transport::Transport;

/// Registry and table, always changed together
#[derive(Debug, Default)]
struct HubState {
    listeners: ListenerRegistry,
    channels: ChannelTable,
}

/// Inter-process broadcast hub
pub struct Broadcaster {
    name: String,
    send_timeout: Duration,
    transport: Box<dyn Transport>,
    delegate: Option<Arc<dyn BroadcasterDelegate>>,
    state: Mutex<HubState>,
    invalidations: mpsc::UnboundedSender<EndpointKey>,
    /// Whether the delegate was last told the hub has listeners.
    /// Held while a callback runs so transitions arrive in order.
    reported_nonzero: Mutex<bool>,
    counters: HubCounters,
}

impl Broadcaster {
    /// Create a hub and the monitor that cleans up after dead listeners.
    ///
    /// The monitor must be run (or polled) for invalidated listeners to be
    /// removed.
    pub fn new<T>(config: &HubConfig, transport: T) -> (Arc<Self>, LifecycleMonitor)
    where
        T: Transport + 'static,
    {
        Self::build(config, Box::new(transport), None)
    }

    /// Create a hub that reports listener count transitions to `delegate`
    pub fn with_delegate<T>(
        config: &HubConfig,
        transport: T,
        delegate: Arc<dyn BroadcasterDelegate>,
    ) -> (Arc<Self>, LifecycleMonitor)
    where
        T: Transport + 'static,
    {
        Self::build(config, Box::new(transport), Some(delegate))
    }

    fn build(
        config: &HubConfig,
        transport: Box<dyn Transport>,
        delegate: Option<Arc<dyn BroadcasterDelegate>>,
    ) -> (Arc<Self>, LifecycleMonitor) {
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Arc::new(Self {
            name: config.name.clone(),
            send_timeout: config.send_timeout,
            transport,
            delegate,
            state: Mutex::new(HubState::default()),
            invalidations: tx,
            reported_nonzero: Mutex::new(false),
            counters: HubCounters::new(),
        });

        let monitor = LifecycleMonitor::new(Arc::downgrade(&hub), rx);
        (hub, monitor)
    }

    /// Broadcaster name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode and execute a raw control request.
    ///
    /// Returns the reply body, if the request has one. Malformed and unknown
    /// requests are dropped: no reply, no state change.
    pub fn handle_control(&self, msg_id: u32, body: &[u8]) -> Option<Bytes> {
        match ControlMessage::decode(msg_id, body) {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                self.counters.record_dropped_request();
                tracing::debug!(msg_id = msg_id, error = %e, "Dropped control request");
                None
            }
        }
    }

    /// Execute a decoded control request
    pub fn dispatch(&self, message: ControlMessage) -> Option<Bytes> {
        match message {
            ControlMessage::GetNextIdentifier => {
                Some(encode_identifier_reply(self.next_listener_identifier()))
            }
            ControlMessage::AddListener { id } => {
                self.add_listener(id);
                None
            }
            ControlMessage::ConnectChannel { id, channel } => {
                self.connect_channel(id, channel);
                None
            }
            ControlMessage::DisconnectChannel { id, channel } => {
                self.disconnect_channel(id, channel);
                None
            }
        }
    }

    /// Hand out a fresh listener identifier
    pub fn next_listener_identifier(&self) -> ListenerId {
        let id = self.state.lock().listeners.allocate_identifier();
        tracing::debug!(listener_id = %id, "Allocated listener identifier");
        id
    }

    /// Open the listener's endpoint and register it.
    ///
    /// Returns `false` if the endpoint could not be opened (the listener
    /// most likely exited already). Registering an id that is already
    /// registered releases the old endpoint and its subscriptions first.
    pub fn add_listener(&self, id: ListenerId) -> bool {
        let endpoint_name = listener_endpoint_name(&self.name, id);

        let endpoint = match self.transport.open_remote(&endpoint_name) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::debug!(
                    listener_id = %id,
                    error = %e,
                    "Listener endpoint unavailable, ignoring"
                );
                return false;
            }
        };

        let (became_nonzero, replaced) = {
            let mut state = self.state.lock();
            let was_empty = state.listeners.is_empty();

            let replaced = state.listeners.register(id, endpoint.clone());
            if let Some(ref old) = replaced {
                state.channels.remove_endpoint_everywhere(old.key());
            }

            endpoint.set_invalidation_notifier(InvalidationNotifier::new(
                endpoint.key(),
                self.invalidations.clone(),
            ));

            (was_empty, replaced)
        };

        self.counters.record_listener_added();

        if let Some(old) = replaced {
            self.counters.record_listener_removed();
            tracing::info!(
                listener_id = %id,
                old_endpoint = %old.key(),
                new_endpoint = %endpoint.key(),
                "Listener re-registered, released previous endpoint"
            );
        } else {
            tracing::info!(listener_id = %id, endpoint = %endpoint_name, "Listener added");
        }

        if became_nonzero {
            self.report_listener_presence();
        }

        true
    }

    /// Subscribe a registered listener to `channel`.
    ///
    /// Returns `false` (and does nothing) for an unknown listener.
    pub fn connect_channel(&self, id: ListenerId, channel: Channel) -> bool {
        let mut state = self.state.lock();

        let Some(endpoint) = state.listeners.lookup_endpoint(id) else {
            tracing::debug!(listener_id = %id, channel = %channel, "Connect from unknown listener");
            return false;
        };

        state.channels.subscribe(channel, endpoint);
        tracing::debug!(listener_id = %id, channel = %channel, "Listener connected to channel");
        true
    }

    /// Unsubscribe a registered listener from `channel`.
    ///
    /// Returns `false` if the listener or the subscription was unknown.
    pub fn disconnect_channel(&self, id: ListenerId, channel: Channel) -> bool {
        let mut state = self.state.lock();

        let Some(endpoint) = state.listeners.lookup_endpoint(id) else {
            tracing::debug!(listener_id = %id, channel = %channel, "Disconnect from unknown listener");
            return false;
        };

        let removed = state.channels.unsubscribe(channel, endpoint.key());
        tracing::debug!(
            listener_id = %id,
            channel = %channel,
            removed = removed,
            "Listener disconnected from channel"
        );
        removed
    }

    /// Send `data` to every listener subscribed to `channel`.
    ///
    /// Called from the producer thread. The hub lock is held for the whole
    /// fan-out and each send may wait up to the send timeout, so this can
    /// block for `subscribers × send_timeout` in the worst case. Real-time
    /// callers should budget for that. Failed sends are counted and skipped;
    /// nothing is retried.
    ///
    /// Returns the number of listeners the data was delivered to.
    pub fn broadcast(&self, data: &[u8], channel: impl Into<Channel>) -> usize {
        let channel = channel.into();
        let mut delivered = 0u64;
        let mut failed = 0u64;
        let mut timed_out = 0u64;

        {
            let state = self.state.lock();

            for endpoint in state.channels.members_of(channel) {
                match endpoint.send(data, self.send_timeout) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        failed += 1;
                        if matches!(e, SendError::Timeout) {
                            timed_out += 1;
                        }
                        tracing::trace!(
                            channel = %channel,
                            endpoint = %endpoint.name(),
                            error = %e,
                            "Broadcast send failed"
                        );
                    }
                }
            }
        }

        self.counters.record_broadcast(delivered, failed, timed_out);
        delivered as usize
    }

    /// Purge the listener owning `key` from the registry and every channel.
    ///
    /// Entry point for the lifecycle monitor. Returns the freed identifier,
    /// or `None` if the endpoint was not registered.
    pub fn remove_listener(&self, key: EndpointKey) -> Option<ListenerId> {
        let (id, swept, became_zero) = {
            let mut state = self.state.lock();
            let swept = state.channels.remove_endpoint_everywhere(key);
            let id = state.listeners.remove(key);
            (id, swept, id.is_some() && state.listeners.is_empty())
        };

        let Some(id) = id else {
            tracing::trace!(endpoint = %key, "Invalidation for unregistered endpoint");
            return None;
        };

        self.counters.record_listener_removed();
        tracing::info!(listener_id = %id, subscriptions = swept, "Listener removed");

        if became_zero {
            self.report_listener_presence();
        }

        Some(id)
    }

    /// Remove the listener registered under `id`, if any.
    ///
    /// Used when the listener's control stream closes, which can happen
    /// before any send to it fails.
    pub fn release_listener(&self, id: ListenerId) -> Option<ListenerId> {
        let key = self.state.lock().listeners.lookup_endpoint(id)?.key();
        self.remove_listener(key)
    }

    /// Tell the delegate whether the hub has listeners, if that changed
    /// since the last callback.
    ///
    /// Racing add and remove calls may each see a transition; the check
    /// against the current count under `reported_nonzero` keeps the
    /// callbacks alternating and ending on the true state.
    fn report_listener_presence(&self) {
        let Some(ref delegate) = self.delegate else {
            return;
        };

        let mut reported = self.reported_nonzero.lock();
        let nonzero = !self.state.lock().listeners.is_empty();
        if nonzero == *reported {
            return;
        }

        *reported = nonzero;
        if nonzero {
            delegate.listener_count_became_nonzero();
        } else {
            delegate.listener_count_became_zero();
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.count()
    }

    /// Registered listener identifiers, ascending
    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.state.lock().listeners.identifiers()
    }

    /// Listeners subscribed to `channel`, in subscription order
    pub fn channel_members(&self, channel: Channel) -> Vec<ListenerId> {
        let state = self.state.lock();
        state
            .channels
            .members_of(channel)
            .iter()
            .filter_map(|endpoint| state.listeners.lookup_identifier(endpoint.key()))
            .collect()
    }

    /// Channels the listener is subscribed to, ascending
    pub fn listener_channels(&self, id: ListenerId) -> Vec<Channel> {
        let state = self.state.lock();
        state
            .listeners
            .lookup_endpoint(id)
            .map(|endpoint| state.channels.channels_of(endpoint.key()))
            .unwrap_or_default()
    }

    /// Current statistics
    pub fn stats(&self) -> HubStats {
        let (listeners, channels, subscriptions) = {
            let state = self.state.lock();
            (
                state.listeners.count(),
                state.channels.channel_count(),
                state.channels.subscription_count(),
            )
        };
        self.counters.snapshot(listeners, channels, subscriptions)
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("name", &self.name)
            .field("send_timeout", &self.send_timeout)
            .field("has_delegate", &self.delegate.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::protocol::constants::*;
    use crate::protocol::decode_identifier_reply;
    use crate::transport::{MemoryReceiver, MemoryTransport};

    #[derive(Default)]
    struct CountingDelegate {
        nonzero: AtomicUsize,
        zero: AtomicUsize,
    }

    impl BroadcasterDelegate for CountingDelegate {
        fn listener_count_became_nonzero(&self) {
            self.nonzero.fetch_add(1, Ordering::SeqCst);
        }

        fn listener_count_became_zero(&self) {
            self.zero.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        transport: MemoryTransport,
        hub: Arc<Broadcaster>,
        monitor: LifecycleMonitor,
        delegate: Arc<CountingDelegate>,
    }

    impl Fixture {
        fn new() -> Self {
            let transport = MemoryTransport::new();
            let delegate = Arc::new(CountingDelegate::default());
            let (hub, monitor) = Broadcaster::with_delegate(
                &HubConfig::new("spy"),
                transport.clone(),
                Arc::clone(&delegate) as Arc<dyn BroadcasterDelegate>,
            );

            Self {
                transport,
                hub,
                monitor,
                delegate,
            }
        }

        /// Run the listener side of the handshake
        fn listener(&self) -> (ListenerId, MemoryReceiver) {
            let id = self.hub.next_listener_identifier();
            let rx = self
                .transport
                .publish(listener_endpoint_name(self.hub.name(), id));
            assert!(self.hub.add_listener(id));
            (id, rx)
        }

        fn nonzero_calls(&self) -> usize {
            self.delegate.nonzero.load(Ordering::SeqCst)
        }

        fn zero_calls(&self) -> usize {
            self.delegate.zero.load(Ordering::SeqCst)
        }
    }

    fn channel_body(id: ListenerId, channel: i32) -> Vec<u8> {
        let mut body = id.get().to_ne_bytes().to_vec();
        body.extend_from_slice(&channel.to_ne_bytes());
        body
    }

    #[test]
    fn test_identifiers_strictly_increase() {
        let f = Fixture::new();

        let mut previous = 0;
        for _ in 0..5 {
            let reply = f
                .hub
                .handle_control(MSG_GET_NEXT_LISTENER_IDENTIFIER, &[])
                .unwrap();
            let id = decode_identifier_reply(&reply).unwrap().get();
            assert!(id > previous);
            previous = id;
        }
        assert_eq!(previous, 5);
        assert_eq!(f.hub.listener_count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_only_subscribed_channel() {
        let f = Fixture::new();
        let (id, rx) = f.listener();
        assert_eq!(id, ListenerId::new(1));

        assert!(f.hub.connect_channel(id, Channel::new(5)));

        const NOTE_ON: [u8; 3] = [0x90, 0x40, 0x7F];
        assert_eq!(f.hub.broadcast(&NOTE_ON, Channel::new(5)), 1);
        assert_eq!(rx.drain(), vec![Bytes::from_static(&NOTE_ON)]);

        assert_eq!(f.hub.broadcast(&NOTE_ON, Channel::new(6)), 0);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_broadcast_skips_unsubscribed_listeners() {
        let f = Fixture::new();
        let (a, rx_a) = f.listener();
        let (_b, rx_b) = f.listener();

        f.hub.connect_channel(a, Channel::new(1));
        f.hub.broadcast(&[0xF8], Channel::new(1));

        assert_eq!(rx_a.pending(), 1);
        assert_eq!(rx_b.pending(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let f = Fixture::new();
        let (id, rx) = f.listener();

        f.hub.connect_channel(id, Channel::new(3));
        f.hub.broadcast(&[1], Channel::new(3));
        assert!(f.hub.disconnect_channel(id, Channel::new(3)));
        f.hub.broadcast(&[2], Channel::new(3));

        assert_eq!(rx.drain(), vec![Bytes::from_static(&[1])]);
        assert!(f.hub.channel_members(Channel::new(3)).is_empty());
    }

    #[test]
    fn test_invalidated_listener_is_purged() {
        let mut f = Fixture::new();
        let (a, rx_a) = f.listener();
        let (b, rx_b) = f.listener();

        f.hub.connect_channel(a, Channel::new(2));
        f.hub.connect_channel(b, Channel::new(2));
        f.hub.connect_channel(a, Channel::new(7));
        assert_eq!(f.hub.listener_count(), 2);

        // Listener A's process goes away
        drop(rx_a);
        assert_eq!(f.monitor.process_pending(), 1);

        assert_eq!(f.hub.listener_count(), 1);
        assert_eq!(f.hub.channel_members(Channel::new(2)), vec![b]);
        assert!(f.hub.channel_members(Channel::new(7)).is_empty());
        assert!(f.hub.listener_channels(a).is_empty());

        assert_eq!(f.hub.broadcast(&[0x90, 0x3C, 0x40], Channel::new(2)), 1);
        assert_eq!(rx_b.pending(), 1);

        // One listener remains
        assert_eq!(f.zero_calls(), 0);
    }

    #[test]
    fn test_listener_count_callbacks() {
        let mut f = Fixture::new();

        let (_a, rx_a) = f.listener();
        assert_eq!(f.nonzero_calls(), 1);

        let (_b, rx_b) = f.listener();
        assert_eq!(f.nonzero_calls(), 1);

        drop(rx_a);
        f.monitor.process_pending();
        assert_eq!(f.zero_calls(), 0);

        drop(rx_b);
        f.monitor.process_pending();
        assert_eq!(f.zero_calls(), 1);
        assert_eq!(f.hub.listener_count(), 0);

        // Back above zero
        let (_c, _rx_c) = f.listener();
        assert_eq!(f.nonzero_calls(), 2);
    }

    #[test]
    fn test_add_listener_without_endpoint_is_ignored() {
        let f = Fixture::new();
        let id = f.hub.next_listener_identifier();

        assert!(!f.hub.add_listener(id));
        assert_eq!(f.hub.listener_count(), 0);
        assert_eq!(f.nonzero_calls(), 0);
    }

    #[test]
    fn test_malformed_connect_leaves_table_unchanged() {
        let f = Fixture::new();
        let (id, _rx) = f.listener();

        let body = channel_body(id, 4);
        assert!(f.hub.handle_control(MSG_CONNECT_CHANNEL, &body[..6]).is_none());
        assert!(f.hub.handle_control(MSG_CONNECT_CHANNEL, &[body.clone(), vec![0]].concat()).is_none());
        assert!(f.hub.handle_control(99, &body).is_none());

        assert!(f.hub.channel_members(Channel::new(4)).is_empty());
        assert_eq!(f.hub.stats().subscriptions, 0);
        assert_eq!(f.hub.stats().dropped_requests, 3);

        // The well-formed request still works
        assert!(f.hub.handle_control(MSG_CONNECT_CHANNEL, &body).is_none());
        assert_eq!(f.hub.channel_members(Channel::new(4)), vec![id]);
    }

    #[test]
    fn test_control_flow_over_raw_messages() {
        let f = Fixture::new();

        let reply = f
            .hub
            .handle_control(MSG_GET_NEXT_LISTENER_IDENTIFIER, &[])
            .unwrap();
        let id = decode_identifier_reply(&reply).unwrap();
        let rx = f.transport.publish(listener_endpoint_name("spy", id));

        assert!(f.hub.handle_control(MSG_ADD_LISTENER, &id.get().to_ne_bytes()).is_none());
        assert!(f
            .hub
            .handle_control(MSG_CONNECT_CHANNEL, &channel_body(id, -1))
            .is_none());

        f.hub.broadcast(&[0xB0, 0x07, 0x64], Channel::new(-1));
        assert_eq!(rx.pending(), 1);

        f.hub.handle_control(MSG_DISCONNECT_CHANNEL, &channel_body(id, -1));
        assert!(f.hub.listener_channels(id).is_empty());
    }

    #[test]
    fn test_connect_unknown_listener_is_noop() {
        let f = Fixture::new();

        assert!(!f.hub.connect_channel(ListenerId::new(42), Channel::new(1)));
        assert!(!f.hub.disconnect_channel(ListenerId::new(42), Channel::new(1)));
        assert_eq!(f.hub.stats().channels, 0);
    }

    #[test]
    fn test_duplicate_subscribe_delivers_twice() {
        let f = Fixture::new();
        let (id, rx) = f.listener();

        f.hub.connect_channel(id, Channel::new(1));
        f.hub.connect_channel(id, Channel::new(1));
        assert_eq!(f.hub.broadcast(&[0xFE], Channel::new(1)), 2);
        assert_eq!(rx.pending(), 2);

        // One disconnect removes one membership
        f.hub.disconnect_channel(id, Channel::new(1));
        assert_eq!(f.hub.broadcast(&[0xFE], Channel::new(1)), 1);
    }

    #[test]
    fn test_duplicate_add_listener_replaces_endpoint() {
        let mut f = Fixture::new();
        let (id, old_rx) = f.listener();
        f.hub.connect_channel(id, Channel::new(8));

        // Same id announced again after the listener republished its endpoint
        let new_rx = f.transport.publish(listener_endpoint_name("spy", id));
        assert!(f.hub.add_listener(id));

        assert_eq!(f.hub.listener_count(), 1);
        assert_eq!(f.nonzero_calls(), 1);
        // The old endpoint's subscriptions went with it
        assert!(f.hub.listener_channels(id).is_empty());

        f.hub.connect_channel(id, Channel::new(8));
        f.hub.broadcast(&[0x01], Channel::new(8));
        assert_eq!(new_rx.pending(), 1);
        assert_eq!(old_rx.pending(), 0);

        // The released endpoint's late invalidation changes nothing
        drop(old_rx);
        f.monitor.process_pending();
        assert_eq!(f.hub.listener_count(), 1);
        assert_eq!(f.zero_calls(), 0);
    }

    #[test]
    fn test_stalled_listener_does_not_block_others() {
        let f = Fixture::new();

        let stalled_id = f.hub.next_listener_identifier();
        let _stalled = f
            .transport
            .publish_with_capacity(listener_endpoint_name("spy", stalled_id), 0);
        f.hub.add_listener(stalled_id);

        let (ok_id, ok_rx) = f.listener();

        f.hub.connect_channel(stalled_id, Channel::new(1));
        f.hub.connect_channel(ok_id, Channel::new(1));

        assert_eq!(f.hub.broadcast(&[0x90, 0x40, 0x7F], Channel::new(1)), 1);
        assert_eq!(ok_rx.pending(), 1);

        let stats = f.hub.stats();
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.failed_sends, 1);
        assert_eq!(stats.timed_out_sends, 1);
        // A timeout is not an invalidation
        assert_eq!(stats.listeners, 2);
    }

    #[test]
    fn test_release_listener_by_id() {
        let f = Fixture::new();
        let (id, _rx) = f.listener();
        f.hub.connect_channel(id, Channel::new(9));

        assert_eq!(f.hub.release_listener(id), Some(id));
        assert_eq!(f.hub.listener_count(), 0);
        assert!(f.hub.channel_members(Channel::new(9)).is_empty());
        assert_eq!(f.zero_calls(), 1);

        // Already gone
        assert_eq!(f.hub.release_listener(id), None);
        assert_eq!(f.zero_calls(), 1);
    }

    #[test]
    fn test_racing_transitions_are_reported_in_order() {
        #[derive(Default)]
        struct Recorder(parking_lot::Mutex<Vec<bool>>);

        impl BroadcasterDelegate for Recorder {
            fn listener_count_became_nonzero(&self) {
                self.0.lock().push(true);
            }

            fn listener_count_became_zero(&self) {
                self.0.lock().push(false);
            }
        }

        let transport = MemoryTransport::new();
        let recorder = Arc::new(Recorder::default());
        let (hub, _monitor) = Broadcaster::with_delegate(
            &HubConfig::new("spy"),
            transport.clone(),
            Arc::clone(&recorder) as Arc<dyn BroadcasterDelegate>,
        );

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let hub = Arc::clone(&hub);
                let transport = transport.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let id = hub.next_listener_identifier();
                        let _rx = transport.publish(listener_endpoint_name("spy", id));
                        assert!(hub.add_listener(id));
                        assert_eq!(hub.release_listener(id), Some(id));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let events = recorder.0.lock();
        assert_eq!(events.first(), Some(&true));
        assert!(events.windows(2).all(|pair| pair[0] != pair[1]));
        // The gate ends closed, matching the empty hub
        assert_eq!(events.last(), Some(&false));
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_stale_invalidation_is_ignored() {
        let f = Fixture::new();
        assert_eq!(f.hub.remove_listener(EndpointKey::allocate()), None);
        assert_eq!(f.zero_calls(), 0);
    }

    #[test]
    fn test_registration_is_bijective_across_many_listeners() {
        let f = Fixture::new();
        let mut receivers = Vec::new();

        for _ in 0..10 {
            receivers.push(f.listener());
        }
        // One id whose endpoint never appears
        let ghost = f.hub.next_listener_identifier();
        f.hub.add_listener(ghost);

        let ids: Vec<_> = receivers.iter().map(|(id, _)| *id).collect();
        assert_eq!(f.hub.listener_count(), 10);
        assert_eq!(f.hub.listener_ids(), ids);
    }

    #[test]
    fn test_concurrent_broadcast_and_control() {
        let f = Fixture::new();
        let (id, rx) = f.listener();
        f.hub.connect_channel(id, Channel::new(0));

        let producer = {
            let hub = Arc::clone(&f.hub);
            std::thread::spawn(move || {
                for i in 0..200u8 {
                    hub.broadcast(&[0x90, i & 0x7F, 0x40], Channel::new(0));
                }
            })
        };

        for _ in 0..50 {
            f.hub.connect_channel(id, Channel::new(1));
            f.hub.disconnect_channel(id, Channel::new(1));
        }

        producer.join().unwrap();
        assert_eq!(rx.pending(), 200);
        assert_eq!(f.hub.listener_channels(id), vec![Channel::new(0)]);
    }

    #[test]
    fn test_delegate_may_reenter_hub() {
        struct Reentrant(parking_lot::Mutex<Option<Arc<Broadcaster>>>, AtomicUsize);

        impl BroadcasterDelegate for Reentrant {
            fn listener_count_became_nonzero(&self) {
                if let Some(hub) = self.0.lock().as_ref() {
                    self.1.store(hub.listener_count(), Ordering::SeqCst);
                }
            }

            fn listener_count_became_zero(&self) {}
        }

        let transport = MemoryTransport::new();
        let delegate = Arc::new(Reentrant(parking_lot::Mutex::new(None), AtomicUsize::new(0)));
        let (hub, _monitor) = Broadcaster::with_delegate(
            &HubConfig::new("spy"),
            transport.clone(),
            Arc::clone(&delegate) as Arc<dyn BroadcasterDelegate>,
        );
        *delegate.0.lock() = Some(Arc::clone(&hub));

        let id = hub.next_listener_identifier();
        let _rx = transport.publish(listener_endpoint_name("spy", id));
        hub.add_listener(id);

        assert_eq!(delegate.1.load(Ordering::SeqCst), 1);

        // Break the cycle
        delegate.0.lock().take();
    }
}
