use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub title: String,
    pub last_push_hash: Option<String>,
    pub last_push_screens: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChannelSlideRow {
    pub channel_id: i64,
    pub sort_order: i32,
    pub id: i64,
    pub title: String,
    pub template: String,
    pub options: serde_json::Value,
    pub media_type: Option<String>,
    pub duration: Option<i32>,
    pub published: bool,
    pub schedule_from: Option<DateTime<Utc>>,
    pub schedule_to: Option<DateTime<Utc>>,
    pub external_data: Option<serde_json::Value>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChannelSharingIndexRow {
    pub channel_id: i64,
    pub id: i64,
    pub name: String,
    pub index_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SharedChannelRow {
    pub unique_id: String,
    pub index_key: String,
    pub content: String,
    pub last_push_hash: Option<String>,
    pub last_push_screens: Option<serde_json::Value>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScreenRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub options: serde_json::Value,
    pub activation_code: Option<String>,
    pub modified_at: DateTime<Utc>,
    pub template_id: String,
    pub template_name: String,
    pub template_orientation: Option<String>,
    pub template_options: serde_json::Value,
}

/// One `channel_screen_regions` row. Exactly one of the two channel
/// columns is set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RegionRow {
    pub id: i64,
    pub screen_id: i64,
    pub region: i32,
    pub channel_id: Option<i64>,
    pub shared_channel_id: Option<String>,
}
