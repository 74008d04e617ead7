use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Channel, ChannelKey, PushState, Screen, SharedChannel};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("channel screen region {0} must reference exactly one channel or shared channel")]
    InvalidRegion(i64),
}

/// Persistence boundary. Entities come back fully hydrated.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn channels(&self) -> Result<Vec<Channel>, StoreError>;

    async fn shared_channels(&self) -> Result<Vec<SharedChannel>, StoreError>;

    async fn screen(&self, id: i64) -> Result<Option<Screen>, StoreError>;

    async fn channel(&self, id: i64) -> Result<Option<Channel>, StoreError>;

    /// Writes push bookkeeping for one channel. Durable once this returns.
    async fn save_push_state(&self, key: &ChannelKey, state: &PushState)
        -> Result<(), StoreError>;
}
