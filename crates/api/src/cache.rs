use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use signage_core::cache::ProjectionCache;
use signage_core::projection::Projection;

const KEY_PREFIX: &str = "signage:projection:";

fn redis_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

/// Projection cache shared by every api instance. Redis failures degrade to
/// a cache miss.
pub struct RedisProjectionCache {
    client: redis::Client,
}

impl RedisProjectionCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(error = %err, "redis unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl ProjectionCache for RedisProjectionCache {
    async fn get(&self, key: &str) -> Option<Projection> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match redis::cmd("GET")
            .arg(redis_key(key))
            .query_async(&mut conn)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "projection cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(projection) => Some(projection),
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable cached projection");
                None
            }
        }
    }

    async fn put(&self, key: &str, value: &Projection, ttl: Duration) {
        let body = match serde_json::to_string(value) {
            Ok(body) => body,
            Err(err) => {
                warn!(key, error = %err, "projection not cacheable");
                return;
            }
        };
        let Some(mut conn) = self.connection().await else {
            return;
        };

        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(redis_key(key))
            .arg(body)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await;
        if let Err(err) = result {
            warn!(key, error = %err, "projection cache write failed");
        }
    }
}
