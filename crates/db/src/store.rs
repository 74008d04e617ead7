use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::warn;

use signage_core::legacy::encode_screen_ids;
use signage_core::store::{ContentStore, StoreError};
use signage_core::types::{
    Channel, ChannelKey, ChannelScreenRegion, PushState, RegionChannel, Screen, ScreenRegion,
    ScreenTemplate, SharedChannel, SharingIndex, Slide,
};

use crate::models::{
    ChannelRow, ChannelSharingIndexRow, ChannelSlideRow, RegionRow, ScreenRow, SharedChannelRow,
};
use crate::queries;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate_channels(&self, rows: Vec<ChannelRow>) -> Result<Vec<Channel>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let slides = queries::slides::list_for_channels(&self.pool, &ids)
            .await
            .map_err(backend)?;
        let indexes = queries::channels::list_sharing_indexes(&self.pool, &ids)
            .await
            .map_err(backend)?;
        let regions = queries::regions::list_for_channels(&self.pool, &ids)
            .await
            .map_err(backend)?;
        Ok(assemble_channels(rows, slides, indexes, regions))
    }

    async fn hydrate_shared(
        &self,
        rows: Vec<SharedChannelRow>,
    ) -> Result<Vec<SharedChannel>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|row| row.unique_id.clone()).collect();
        let regions = queries::regions::list_for_shared_channels(&self.pool, &ids)
            .await
            .map_err(backend)?;
        Ok(assemble_shared_channels(rows, regions))
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn channels(&self) -> Result<Vec<Channel>, StoreError> {
        let rows = queries::channels::list_all(&self.pool).await.map_err(backend)?;
        self.hydrate_channels(rows).await
    }

    async fn shared_channels(&self) -> Result<Vec<SharedChannel>, StoreError> {
        let rows = queries::shared_channels::list_all(&self.pool)
            .await
            .map_err(backend)?;
        self.hydrate_shared(rows).await
    }

    async fn screen(&self, id: i64) -> Result<Option<Screen>, StoreError> {
        let Some(row) = queries::screens::get_by_id(&self.pool, id)
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let region_rows = queries::regions::list_for_screen(&self.pool, id)
            .await
            .map_err(backend)?;

        let channel_ids: Vec<i64> = region_rows.iter().filter_map(|r| r.channel_id).collect();
        let shared_ids: Vec<String> = region_rows
            .iter()
            .filter_map(|r| r.shared_channel_id.clone())
            .collect();

        let channels = if channel_ids.is_empty() {
            Vec::new()
        } else {
            let rows = queries::channels::list_by_ids(&self.pool, &channel_ids)
                .await
                .map_err(backend)?;
            self.hydrate_channels(rows).await?
        };
        let shared = if shared_ids.is_empty() {
            Vec::new()
        } else {
            let rows = queries::shared_channels::list_by_ids(&self.pool, &shared_ids)
                .await
                .map_err(backend)?;
            self.hydrate_shared(rows).await?
        };

        assemble_screen(row, region_rows, channels, shared).map(Some)
    }

    async fn channel(&self, id: i64) -> Result<Option<Channel>, StoreError> {
        let Some(row) = queries::channels::get_by_id(&self.pool, id)
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };
        Ok(self.hydrate_channels(vec![row]).await?.into_iter().next())
    }

    async fn save_push_state(&self, key: &ChannelKey, state: &PushState) -> Result<(), StoreError> {
        let screens = encode_screen_ids(&state.screens);
        match key {
            ChannelKey::Owned(id) => {
                queries::channels::update_push_state(&self.pool, *id, state.hash.as_deref(), &screens)
                    .await
            }
            ChannelKey::Shared(unique_id) => {
                queries::shared_channels::update_push_state(
                    &self.pool,
                    unique_id,
                    state.hash.as_deref(),
                    &screens,
                )
                .await
            }
        }
        .map_err(backend)
    }
}

fn slide_from_row(row: ChannelSlideRow) -> Slide {
    Slide {
        id: row.id,
        title: row.title,
        template: row.template,
        options: row.options,
        media_type: row.media_type,
        duration: row.duration,
        published: row.published,
        schedule_from: row.schedule_from,
        schedule_to: row.schedule_to,
        external_data: row.external_data,
        modified_at: row.modified_at,
    }
}

fn screen_region(row: &RegionRow) -> ScreenRegion {
    ScreenRegion {
        screen_id: row.screen_id,
        region: row.region,
    }
}

/// Joins channel rows with their slides (already in display order),
/// sharing indexes and region assignments.
pub fn assemble_channels(
    rows: Vec<ChannelRow>,
    slides: Vec<ChannelSlideRow>,
    indexes: Vec<ChannelSharingIndexRow>,
    regions: Vec<RegionRow>,
) -> Vec<Channel> {
    let mut slides_by_channel: HashMap<i64, Vec<Slide>> = HashMap::new();
    for row in slides {
        slides_by_channel
            .entry(row.channel_id)
            .or_default()
            .push(slide_from_row(row));
    }

    let mut indexes_by_channel: HashMap<i64, Vec<SharingIndex>> = HashMap::new();
    for row in indexes {
        indexes_by_channel
            .entry(row.channel_id)
            .or_default()
            .push(SharingIndex {
                id: row.id,
                name: row.name,
                index_key: row.index_key,
            });
    }

    let mut regions_by_channel: HashMap<i64, Vec<ScreenRegion>> = HashMap::new();
    for row in &regions {
        if let Some(channel_id) = row.channel_id {
            regions_by_channel
                .entry(channel_id)
                .or_default()
                .push(screen_region(row));
        }
    }

    rows.into_iter()
        .map(|row| Channel {
            id: row.id,
            title: row.title,
            slides: slides_by_channel.remove(&row.id).unwrap_or_default(),
            sharing_indexes: indexes_by_channel.remove(&row.id).unwrap_or_default(),
            regions: regions_by_channel.remove(&row.id).unwrap_or_default(),
            last_push_hash: row.last_push_hash,
            last_push_screens: row.last_push_screens.unwrap_or(serde_json::Value::Null),
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
        .collect()
}

pub fn assemble_shared_channels(
    rows: Vec<SharedChannelRow>,
    regions: Vec<RegionRow>,
) -> Vec<SharedChannel> {
    let mut regions_by_channel: HashMap<String, Vec<ScreenRegion>> = HashMap::new();
    for row in &regions {
        if let Some(unique_id) = &row.shared_channel_id {
            regions_by_channel
                .entry(unique_id.clone())
                .or_default()
                .push(screen_region(row));
        }
    }

    rows.into_iter()
        .map(|row| SharedChannel {
            regions: regions_by_channel.remove(&row.unique_id).unwrap_or_default(),
            unique_id: row.unique_id,
            index_key: row.index_key,
            content: row.content,
            last_push_hash: row.last_push_hash,
            last_push_screens: row.last_push_screens.unwrap_or(serde_json::Value::Null),
            modified_at: row.modified_at,
        })
        .collect()
}

pub fn assemble_screen(
    row: ScreenRow,
    region_rows: Vec<RegionRow>,
    channels: Vec<Channel>,
    shared: Vec<SharedChannel>,
) -> Result<Screen, StoreError> {
    let channels: HashMap<i64, Channel> = channels.into_iter().map(|c| (c.id, c)).collect();
    let shared: HashMap<String, SharedChannel> = shared
        .into_iter()
        .map(|s| (s.unique_id.clone(), s))
        .collect();

    let mut regions = Vec::with_capacity(region_rows.len());
    for region in region_rows {
        let channel = match (region.channel_id, &region.shared_channel_id) {
            (Some(channel_id), None) => channels.get(&channel_id).cloned().map(RegionChannel::Owned),
            (None, Some(unique_id)) => shared.get(unique_id).cloned().map(RegionChannel::Shared),
            _ => return Err(StoreError::InvalidRegion(region.id)),
        };

        match channel {
            Some(channel) => regions.push(ChannelScreenRegion {
                id: region.id,
                region: region.region,
                channel,
            }),
            None => warn!(region_id = region.id, "region references a missing channel"),
        }
    }

    Ok(Screen {
        id: row.id,
        title: row.title,
        description: row.description,
        options: row.options,
        template: ScreenTemplate {
            id: row.template_id,
            name: row.template_name,
            orientation: row.template_orientation,
            options: row.template_options,
        },
        activation_code: row.activation_code,
        regions,
        modified_at: row.modified_at,
    })
}
