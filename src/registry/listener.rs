//! Listener registry
//!
//! Keeps the identifier ↔ endpoint mapping for registered listeners. Both
//! directions live in one struct and are only changed together, so the
//! mapping stays a bijection.

use std::collections::HashMap;
use std::fmt;

use crate::endpoint::{EndpointKey, ListenerEndpoint};

/// Identifier handed to a listener process by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl ListenerId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ListenerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Registered listeners and the identifier counter
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    /// Last identifier handed out (0 = none yet)
    last_identifier: u32,
    endpoints: HashMap<ListenerId, ListenerEndpoint>,
    identifiers: HashMap<EndpointKey, ListenerId>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next identifier, starting at 1. Wraps at `u32::MAX`.
    pub fn allocate_identifier(&mut self) -> ListenerId {
        self.last_identifier = self.last_identifier.wrapping_add(1);
        ListenerId(self.last_identifier)
    }

    /// Map `id` to `endpoint`.
    ///
    /// Returns the endpoint previously registered under `id`, if it was a
    /// different one. The caller owns releasing it.
    pub fn register(&mut self, id: ListenerId, endpoint: ListenerEndpoint) -> Option<ListenerEndpoint> {
        let key = endpoint.key();

        let previous = self.endpoints.insert(id, endpoint);
        if let Some(ref previous) = previous {
            self.identifiers.remove(&previous.key());
        }

        // Same endpoint under a different id: drop the stale id
        if let Some(stale) = self.identifiers.insert(key, id) {
            if stale != id {
                self.endpoints.remove(&stale);
            }
        }

        previous.filter(|previous| previous.key() != key)
    }

    pub fn lookup_endpoint(&self, id: ListenerId) -> Option<ListenerEndpoint> {
        self.endpoints.get(&id).cloned()
    }

    pub fn lookup_identifier(&self, key: EndpointKey) -> Option<ListenerId> {
        self.identifiers.get(&key).copied()
    }

    /// Remove a listener by endpoint, both directions at once
    pub fn remove(&mut self, key: EndpointKey) -> Option<ListenerId> {
        let id = self.identifiers.remove(&key)?;
        self.endpoints.remove(&id);
        Some(id)
    }

    /// Number of registered listeners
    pub fn count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Registered identifiers in ascending order
    pub fn identifiers(&self) -> Vec<ListenerId> {
        let mut ids: Vec<_> = self.endpoints.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    fn is_bijection(&self) -> bool {
        self.endpoints.len() == self.identifiers.len()
            && self
                .endpoints
                .iter()
                .all(|(id, endpoint)| self.identifiers.get(&endpoint.key()) == Some(id))
    }
}
