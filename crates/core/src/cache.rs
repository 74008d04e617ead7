use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::projection::Projection;

pub fn screen_key(screen_id: i64) -> String {
    format!("screen:{}", screen_id)
}

pub fn public_channel_key(channel_id: i64) -> String {
    format!("channel:{}", channel_id)
}

/// TTL cache for computed projections. Entries are never invalidated on
/// write; staleness is bounded by the TTL alone.
#[async_trait]
pub trait ProjectionCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Projection>;

    async fn put(&self, key: &str, value: &Projection, ttl: Duration);
}

struct Entry {
    expires_at: Instant,
    value: Projection,
}

/// Process-local cache. Expired entries are dropped lazily when read.
#[derive(Default)]
pub struct MemoryProjectionCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ProjectionCache for MemoryProjectionCache {
    async fn get(&self, key: &str) -> Option<Projection> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, value: &Projection, ttl: Duration) {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                expires_at: Instant::now() + ttl,
                value: value.clone(),
            },
        );
    }
}
