//! Denormalized "what is on this screen" view models.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{public_channel_key, screen_key, ProjectionCache};
use crate::events::{ProjectionListener, RegionEntry};
use crate::hash::fingerprint;
use crate::payload::{channel_data, screen_data, shared_channel_data, PayloadError};
use crate::store::{ContentStore, StoreError};
use crate::types::{RegionChannel, Screen};

pub const FULL_SCREEN_TEMPLATE: &str = "full-screen";
pub const FULL_SCREEN_REGION: i32 = 1;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedChannel {
    pub data: Value,
    pub regions: Vec<i32>,
    /// Fingerprint of `{data, regions}`; unchanged hash means unchanged content.
    pub hash: String,
}

impl ProjectedChannel {
    pub fn new(data: Value, regions: Vec<i32>) -> Result<Self, PayloadError> {
        let body = serde_json::to_string(&json!({ "data": &data, "regions": &regions }))?;
        Ok(Self {
            hash: fingerprint(body.as_bytes()),
            data,
            regions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub screen: Value,
    pub channels: BTreeMap<String, ProjectedChannel>,
}

pub struct ScreenProjector {
    store: Arc<dyn ContentStore>,
    cache: Arc<dyn ProjectionCache>,
    ttl: Duration,
    listeners: Vec<Arc<dyn ProjectionListener>>,
}

impl ScreenProjector {
    pub fn new(store: Arc<dyn ContentStore>, cache: Arc<dyn ProjectionCache>, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ttl,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProjectionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn project_screen(&self, screen_id: i64) -> Result<Projection, ProjectionError> {
        let key = screen_key(screen_id);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(screen_id, "projection cache hit");
            return Ok(cached);
        }

        let screen = self
            .store
            .screen(screen_id)
            .await?
            .ok_or_else(|| ProjectionError::NotFound(format!("screen {}", screen_id)))?;

        let mut entries = group_regions(&screen);
        for listener in &self.listeners {
            listener.pre_serialize(&screen, &mut entries);
        }

        let projection = Projection {
            screen: screen_data(&screen),
            channels: project_entries(entries)?,
        };

        self.cache.put(&key, &projection, self.ttl).await;
        Ok(projection)
    }

    /// A single channel shown full-screen, without a physical screen.
    pub async fn project_channel_public(
        &self,
        channel_id: i64,
    ) -> Result<Projection, ProjectionError> {
        let key = public_channel_key(channel_id);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(channel_id, "public projection cache hit");
            return Ok(cached);
        }

        let channel = self
            .store
            .channel(channel_id)
            .await?
            .ok_or_else(|| ProjectionError::NotFound(format!("channel {}", channel_id)))?;

        let screen = json!({
            "id": 0,
            "title": &channel.title,
            "options": {},
            "template": {
                "id": FULL_SCREEN_TEMPLATE,
                "name": "Full screen",
                "orientation": null,
                "options": {},
            },
        });

        let mut channels = BTreeMap::new();
        channels.insert(
            channel.id.to_string(),
            ProjectedChannel::new(channel_data(&channel), vec![FULL_SCREEN_REGION])?,
        );

        let projection = Projection { screen, channels };
        self.cache.put(&key, &projection, self.ttl).await;
        Ok(projection)
    }
}

/// Collapses region rows into one entry per channel, keeping assignment order.
pub fn group_regions(screen: &Screen) -> Vec<RegionEntry> {
    let mut entries: Vec<RegionEntry> = Vec::new();

    for assignment in &screen.regions {
        let key = assignment.channel.key();
        match entries.iter_mut().find(|entry| entry.key() == key) {
            Some(entry) => entry.regions.push(assignment.region),
            None => entries.push(RegionEntry {
                channel: assignment.channel.clone(),
                regions: vec![assignment.region],
            }),
        }
    }

    entries
}

fn project_entries(
    entries: Vec<RegionEntry>,
) -> Result<BTreeMap<String, ProjectedChannel>, PayloadError> {
    let mut channels = BTreeMap::new();

    for entry in entries {
        let key = entry.key();
        let data = match &entry.channel {
            RegionChannel::Owned(channel) => channel_data(channel),
            RegionChannel::Shared(shared) => match shared_channel_data(shared) {
                Ok(data) => data,
                Err(err) => {
                    warn!(channel = %key, error = %err, "skipping undecodable shared channel");
                    continue;
                }
            },
        };

        channels.insert(key.to_string(), ProjectedChannel::new(data, entry.regions)?);
    }

    Ok(channels)
}
