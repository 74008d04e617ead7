use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharingIndex {
    pub id: i64,
    pub name: String,
    pub index_key: String,
}

/// A screen region a channel is assigned to, seen from the channel side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenRegion {
    pub screen_id: i64,
    pub region: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: i64,
    pub title: String,
    pub slides: Vec<Slide>,
    pub sharing_indexes: Vec<SharingIndex>,
    pub regions: Vec<ScreenRegion>,
    pub last_push_hash: Option<String>,
    /// Stored as written; older rows hold a JSON-encoded string instead of a list.
    pub last_push_screens: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedChannel {
    pub unique_id: String,
    pub index_key: String,
    /// Channel JSON from the sharing service. Its `slides` member is itself a JSON string.
    pub content: String,
    pub regions: Vec<ScreenRegion>,
    pub last_push_hash: Option<String>,
    pub last_push_screens: serde_json::Value,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenTemplate {
    pub id: String,
    pub name: String,
    pub orientation: Option<String>,
    pub options: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegionChannel {
    Owned(Channel),
    Shared(SharedChannel),
}

impl RegionChannel {
    pub fn key(&self) -> ChannelKey {
        match self {
            RegionChannel::Owned(channel) => ChannelKey::Owned(channel.id),
            RegionChannel::Shared(shared) => ChannelKey::Shared(shared.unique_id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelScreenRegion {
    pub id: i64,
    pub region: i32,
    pub channel: RegionChannel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub options: serde_json::Value,
    pub template: ScreenTemplate,
    pub activation_code: Option<String>,
    pub regions: Vec<ChannelScreenRegion>,
    pub modified_at: DateTime<Utc>,
}

/// Identity of a channel towards the middleware: database id for owned
/// channels, derived unique id for shared ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKey {
    Owned(i64),
    Shared(String),
}

impl ChannelKey {
    /// JSON form used as the `id` member of middleware payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ChannelKey::Owned(id) => serde_json::Value::from(*id),
            ChannelKey::Shared(unique_id) => serde_json::Value::from(unique_id.as_str()),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Owned(id) => write!(f, "{}", id),
            ChannelKey::Shared(unique_id) => f.write_str(unique_id),
        }
    }
}

/// Bookkeeping written back after a push decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushState {
    pub hash: Option<String>,
    pub screens: Vec<i64>,
}

/// Sorted, de-duplicated screen ids for a set of region assignments.
pub fn screen_ids(regions: &[ScreenRegion]) -> Vec<i64> {
    let mut ids: Vec<i64> = regions.iter().map(|r| r.screen_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_key_display() {
        assert_eq!(ChannelKey::Owned(7).to_string(), "7");
        assert_eq!(ChannelKey::Shared("abc123".to_string()).to_string(), "abc123");
    }

    #[test]
    fn test_channel_key_json() {
        assert_eq!(ChannelKey::Owned(7).to_json(), serde_json::json!(7));
        assert_eq!(
            ChannelKey::Shared("abc".to_string()).to_json(),
            serde_json::json!("abc")
        );
    }

    #[test]
    fn test_screen_ids_sorted_and_unique() {
        let regions = vec![
            ScreenRegion { screen_id: 5, region: 1 },
            ScreenRegion { screen_id: 2, region: 1 },
            ScreenRegion { screen_id: 5, region: 3 },
        ];
        assert_eq!(screen_ids(&regions), vec![2, 5]);
    }

    #[test]
    fn test_screen_ids_empty() {
        assert!(screen_ids(&[]).is_empty());
    }
}
