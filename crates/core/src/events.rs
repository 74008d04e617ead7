//! Synchronous extension points. Listeners run in registration order and
//! the caller waits for each before continuing.

use crate::types::{Channel, ChannelKey, RegionChannel, Screen, SharedChannel};

/// A channel the push cycle will consider.
#[derive(Debug, Clone, PartialEq)]
pub enum PushTarget {
    Channel(Channel),
    Shared(SharedChannel),
}

impl PushTarget {
    pub fn key(&self) -> ChannelKey {
        match self {
            PushTarget::Channel(channel) => ChannelKey::Owned(channel.id),
            PushTarget::Shared(shared) => ChannelKey::Shared(shared.unique_id.clone()),
        }
    }

    pub fn last_push_hash(&self) -> Option<&str> {
        match self {
            PushTarget::Channel(channel) => channel.last_push_hash.as_deref(),
            PushTarget::Shared(shared) => shared.last_push_hash.as_deref(),
        }
    }

    pub fn last_push_screens(&self) -> &serde_json::Value {
        match self {
            PushTarget::Channel(channel) => &channel.last_push_screens,
            PushTarget::Shared(shared) => &shared.last_push_screens,
        }
    }
}

pub trait PushListener: Send + Sync {
    /// Once per cycle, before any channel is examined.
    fn pre_push_channels(&self, _targets: &mut Vec<PushTarget>) {}

    /// Per channel, with the serialized JSON payload about to be hashed and sent.
    fn pre_push_channel(&self, _key: &ChannelKey, _payload: &mut String) {}

    /// Once per cycle, after orphan cleanup.
    fn post_push_channels(&self) {}
}

/// One channel placed on a screen, with every region it occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionEntry {
    pub channel: RegionChannel,
    pub regions: Vec<i32>,
}

impl RegionEntry {
    pub fn key(&self) -> ChannelKey {
        self.channel.key()
    }
}

pub trait ProjectionListener: Send + Sync {
    /// Runs before channel data is serialized; may rewrite which channels
    /// occupy which regions.
    fn pre_serialize(&self, _screen: &Screen, _entries: &mut Vec<RegionEntry>) {}
}
