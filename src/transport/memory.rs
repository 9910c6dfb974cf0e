//! In-process transport
//!
//! Each published name owns a queue. [`MemoryTransport::publish`] plays the
//! listener's role (create the receive endpoint), `open_remote` plays the
//! hub's role. Dropping or closing the [`MemoryReceiver`] invalidates every
//! endpoint opened to it, the same way a listener process exiting
//! invalidates its socket.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use super::Transport;
use crate::endpoint::{EndpointKey, InvalidationNotifier, ListenerEndpoint, RemoteEndpoint};
use crate::error::{SendError, TransportError};

type PortMap = Arc<Mutex<HashMap<String, Arc<Port>>>>;

#[derive(Debug)]
struct Port {
    name: String,
    /// Queue depth after which sends time out (None = unbounded)
    capacity: Option<usize>,
    queue: Mutex<VecDeque<Bytes>>,
    closed: AtomicBool,
    notifiers: Mutex<Vec<InvalidationNotifier>>,
}

impl Port {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let notifiers: Vec<_> = self.notifiers.lock().drain(..).collect();
        for notifier in notifiers {
            notifier.notify();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Transport backed by in-process queues
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    ports: PortMap,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an unbounded receive endpoint under `name`
    pub fn publish(&self, name: impl Into<String>) -> MemoryReceiver {
        self.publish_port(name.into(), None)
    }

    /// Publish a receive endpoint that stops accepting data once `capacity`
    /// payloads are queued. Further sends fail with [`SendError::Timeout`].
    pub fn publish_with_capacity(&self, name: impl Into<String>, capacity: usize) -> MemoryReceiver {
        self.publish_port(name.into(), Some(capacity))
    }

    fn publish_port(&self, name: String, capacity: Option<usize>) -> MemoryReceiver {
        let port = Arc::new(Port {
            name: name.clone(),
            capacity,
            queue: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            notifiers: Mutex::new(Vec::new()),
        });

        self.ports.lock().insert(name, Arc::clone(&port));

        MemoryReceiver {
            port,
            ports: Arc::clone(&self.ports),
        }
    }
}

impl Transport for MemoryTransport {
    fn open_remote(&self, name: &str) -> Result<ListenerEndpoint, TransportError> {
        let ports = self.ports.lock();
        let port = ports
            .get(name)
            .filter(|port| !port.is_closed())
            .ok_or_else(|| TransportError::EndpointNotFound(name.to_string()))?;

        Ok(ListenerEndpoint::new(MemoryEndpoint {
            key: EndpointKey::allocate(),
            port: Arc::clone(port),
        }))
    }
}

#[derive(Debug)]
struct MemoryEndpoint {
    key: EndpointKey,
    port: Arc<Port>,
}

impl RemoteEndpoint for MemoryEndpoint {
    fn key(&self) -> EndpointKey {
        self.key
    }

    fn name(&self) -> &str {
        &self.port.name
    }

    fn send(&self, data: &[u8], _timeout: Duration) -> Result<(), SendError> {
        if self.port.is_closed() {
            return Err(SendError::Invalidated);
        }

        let mut queue = self.port.queue.lock();
        if let Some(capacity) = self.port.capacity {
            if queue.len() >= capacity {
                return Err(SendError::Timeout);
            }
        }

        queue.push_back(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn set_invalidation_notifier(&self, notifier: InvalidationNotifier) {
        let mut notifiers = self.port.notifiers.lock();
        if self.port.is_closed() {
            drop(notifiers);
            notifier.notify();
        } else {
            notifiers.push(notifier);
        }
    }
}

/// Listener side of a published in-memory endpoint
#[derive(Debug)]
pub struct MemoryReceiver {
    port: Arc<Port>,
    ports: PortMap,
}

impl MemoryReceiver {
    pub fn name(&self) -> &str {
        &self.port.name
    }

    /// Pop the oldest delivered payload
    pub fn try_recv(&self) -> Option<Bytes> {
        self.port.queue.lock().pop_front()
    }

    /// Take every delivered payload
    pub fn drain(&self) -> Vec<Bytes> {
        self.port.queue.lock().drain(..).collect()
    }

    /// Number of payloads waiting
    pub fn pending(&self) -> usize {
        self.port.queue.lock().len()
    }

    /// Withdraw the endpoint and invalidate everything opened to it
    pub fn close(&self) {
        {
            let mut ports = self.ports.lock();
            if ports
                .get(&self.port.name)
                .is_some_and(|published| Arc::ptr_eq(published, &self.port))
            {
                ports.remove(&self.port.name);
            }
        }

        self.port.close();
    }

    pub fn is_closed(&self) -> bool {
        self.port.is_closed()
    }
}

impl Drop for MemoryReceiver {
    fn drop(&mut self) {
        self.close();
    }
}
