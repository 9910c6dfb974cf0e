//! Channel subscription table
//!
//! Maps each channel to the endpoints subscribed to it, in subscription
//! order. A channel has an entry only while at least one endpoint is
//! subscribed. Subscribing twice appends twice; each unsubscribe removes
//! one occurrence.

use std::collections::HashMap;
use std::fmt;

use crate::endpoint::{EndpointKey, ListenerEndpoint};

/// Logical broadcast channel (a spied MIDI destination)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(i32);

impl Channel {
    pub const fn new(channel: i32) -> Self {
        Self(channel)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Channel {
    fn from(channel: i32) -> Self {
        Self(channel)
    }
}

/// Channel → subscribed endpoints
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: HashMap<Channel, Vec<ListenerEndpoint>>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `endpoint` to the channel's members
    pub fn subscribe(&mut self, channel: Channel, endpoint: ListenerEndpoint) {
        self.channels.entry(channel).or_default().push(endpoint);
    }

    /// Remove the first occurrence of the endpoint from the channel.
    ///
    /// Returns `false` if the channel or endpoint was unknown.
    pub fn unsubscribe(&mut self, channel: Channel, key: EndpointKey) -> bool {
        let Some(members) = self.channels.get_mut(&channel) else {
            return false;
        };

        let Some(index) = members.iter().position(|member| member.key() == key) else {
            return false;
        };

        members.remove(index);
        if members.is_empty() {
            self.channels.remove(&channel);
        }
        true
    }

    /// Endpoints subscribed to `channel`, in subscription order
    pub fn members_of(&self, channel: Channel) -> &[ListenerEndpoint] {
        self.channels
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Purge the endpoint from every channel.
    ///
    /// Returns the number of memberships removed.
    pub fn remove_endpoint_everywhere(&mut self, key: EndpointKey) -> usize {
        let mut removed = 0;

        self.channels.retain(|_, members| {
            let before = members.len();
            members.retain(|member| member.key() != key);
            removed += before - members.len();
            !members.is_empty()
        });

        removed
    }

    /// Channels the endpoint is subscribed to, ascending
    pub fn channels_of(&self, key: EndpointKey) -> Vec<Channel> {
        let mut channels: Vec<_> = self
            .channels
            .iter()
            .filter(|(_, members)| members.iter().any(|member| member.key() == key))
            .map(|(channel, _)| *channel)
            .collect();
        channels.sort_unstable();
        channels
    }

    /// Number of channels with at least one subscriber
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total memberships across all channels
    pub fn subscription_count(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
