//! Remote listener endpoints
//!
//! A [`ListenerEndpoint`] is the hub's handle to one listener's receive
//! endpoint. Handles compare and hash by [`EndpointKey`], the identity the
//! transport assigned when it opened the underlying socket or port, so two
//! handles opened under the same name are still distinct endpoints.

pub mod invalidation;

pub use invalidation::InvalidationNotifier;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SendError;

static NEXT_ENDPOINT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of an opened remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(u64);

impl EndpointKey {
    /// Allocate a key that no other endpoint in this process has
    pub fn allocate() -> Self {
        Self(NEXT_ENDPOINT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep#{}", self.0)
    }
}

/// Send side of a listener's receive endpoint
///
/// Implemented by each transport. `send` is one-way and best-effort: it may
/// wait up to `timeout` for the transport to accept the data and must not
/// block longer than that.
pub trait RemoteEndpoint: Send + Sync + fmt::Debug {
    /// Identity assigned at open time
    fn key(&self) -> EndpointKey;

    /// Name the endpoint was opened under
    fn name(&self) -> &str;

    /// Deliver `data`, waiting at most `timeout`
    fn send(&self, data: &[u8], timeout: Duration) -> Result<(), SendError>;

    /// Install the token handed back when this endpoint dies.
    ///
    /// If the endpoint is already dead the notifier fires immediately.
    fn set_invalidation_notifier(&self, notifier: InvalidationNotifier);
}

/// Shared, identity-compared handle to a remote endpoint
#[derive(Clone)]
pub struct ListenerEndpoint {
    key: EndpointKey,
    inner: Arc<dyn RemoteEndpoint>,
}

impl ListenerEndpoint {
    pub fn new<E: RemoteEndpoint + 'static>(endpoint: E) -> Self {
        Self::from_arc(Arc::new(endpoint))
    }

    pub fn from_arc(inner: Arc<dyn RemoteEndpoint>) -> Self {
        Self {
            key: inner.key(),
            inner,
        }
    }

    pub fn key(&self) -> EndpointKey {
        self.key
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn send(&self, data: &[u8], timeout: Duration) -> Result<(), SendError> {
        self.inner.send(data, timeout)
    }

    pub fn set_invalidation_notifier(&self, notifier: InvalidationNotifier) {
        self.inner.set_invalidation_notifier(notifier)
    }
}

impl PartialEq for ListenerEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ListenerEndpoint {}

impl Hash for ListenerEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for ListenerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEndpoint")
            .field("key", &self.key)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, Transport};

    #[test]
    fn test_keys_are_unique() {
        let a = EndpointKey::allocate();
        let b = EndpointKey::allocate();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_equality_is_by_identity_not_name() {
        let transport = MemoryTransport::new();
        let _rx = transport.publish("spy-1");

        let first = transport.open_remote("spy-1").unwrap();
        let second = transport.open_remote("spy-1").unwrap();

        assert_eq!(first.name(), second.name());
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }

    #[test]
    fn test_hash_by_key() {
        use std::collections::HashSet;

        let transport = MemoryTransport::new();
        let _rx = transport.publish("spy-1");
        let endpoint = transport.open_remote("spy-1").unwrap();

        let mut set = HashSet::new();
        set.insert(endpoint.clone());
        set.insert(endpoint.clone());
        assert_eq!(set.len(), 1);
        assert!(set.contains(&endpoint));
    }
}
