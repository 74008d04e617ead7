//! In-memory collaborators for tests: a `ContentStore` that hydrates entities
//! from flat assignment rows, and a transport that records every call and
//! mimics the middleware's channel bookkeeping.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::legacy::{encode_screen_ids, normalize_screen_ids};
use crate::middleware::{Method, MiddlewareError, MiddlewareTransport, TransportResponse};
use crate::store::{ContentStore, StoreError};
use crate::types::{
    Channel, ChannelKey, ChannelScreenRegion, PushState, RegionChannel, Screen, ScreenRegion,
    SharedChannel,
};

#[derive(Debug, Clone)]
struct Assignment {
    id: i64,
    screen_id: i64,
    region: i32,
    key: ChannelKey,
}

#[derive(Default)]
struct StoreState {
    channels: Vec<Channel>,
    shared: Vec<SharedChannel>,
    screens: Vec<Screen>,
    assignments: Vec<Assignment>,
    saves: Vec<(ChannelKey, PushState)>,
    fail_saves: bool,
}

impl StoreState {
    fn regions_for(&self, key: &ChannelKey) -> Vec<ScreenRegion> {
        self.assignments
            .iter()
            .filter(|a| &a.key == key)
            .map(|a| ScreenRegion {
                screen_id: a.screen_id,
                region: a.region,
            })
            .collect()
    }

    fn hydrated_channel(&self, channel: &Channel) -> Channel {
        let mut channel = channel.clone();
        channel.regions = self.regions_for(&ChannelKey::Owned(channel.id));
        channel
    }

    fn hydrated_shared(&self, shared: &SharedChannel) -> SharedChannel {
        let mut shared = shared.clone();
        shared.regions = self.regions_for(&ChannelKey::Shared(shared.unique_id.clone()));
        shared
    }

    fn region_channel(&self, key: &ChannelKey) -> Option<RegionChannel> {
        match key {
            ChannelKey::Owned(id) => self
                .channels
                .iter()
                .find(|c| c.id == *id)
                .map(|c| RegionChannel::Owned(self.hydrated_channel(c))),
            ChannelKey::Shared(unique_id) => self
                .shared
                .iter()
                .find(|s| &s.unique_id == unique_id)
                .map(|s| RegionChannel::Shared(self.hydrated_shared(s))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    loads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&self, channel: Channel) {
        self.state.lock().unwrap().channels.push(channel);
    }

    pub fn add_shared_channel(&self, shared: SharedChannel) {
        self.state.lock().unwrap().shared.push(shared);
    }

    pub fn add_screen(&self, screen: Screen) {
        self.state.lock().unwrap().screens.push(screen);
    }

    pub fn assign(&self, screen_id: i64, region: i32, key: ChannelKey) {
        let mut state = self.state.lock().unwrap();
        let id = state.assignments.len() as i64 + 1;
        state.assignments.push(Assignment {
            id,
            screen_id,
            region,
            key,
        });
    }

    pub fn unassign(&self, screen_id: i64, key: &ChannelKey) {
        self.state
            .lock()
            .unwrap()
            .assignments
            .retain(|a| !(a.screen_id == screen_id && &a.key == key));
    }

    pub fn remove_channel(&self, id: i64) {
        let mut state = self.state.lock().unwrap();
        state.channels.retain(|c| c.id != id);
        state.assignments.retain(|a| a.key != ChannelKey::Owned(id));
    }

    pub fn update_channel(&self, id: i64, update: impl FnOnce(&mut Channel)) {
        let mut state = self.state.lock().unwrap();
        if let Some(channel) = state.channels.iter_mut().find(|c| c.id == id) {
            update(channel);
        }
    }

    pub fn update_shared_channel(&self, unique_id: &str, update: impl FnOnce(&mut SharedChannel)) {
        let mut state = self.state.lock().unwrap();
        if let Some(shared) = state.shared.iter_mut().find(|s| s.unique_id == unique_id) {
            update(shared);
        }
    }

    pub fn channel_record(&self, id: i64) -> Option<Channel> {
        let state = self.state.lock().unwrap();
        state
            .channels
            .iter()
            .find(|c| c.id == id)
            .map(|c| state.hydrated_channel(c))
    }

    pub fn shared_record(&self, unique_id: &str) -> Option<SharedChannel> {
        let state = self.state.lock().unwrap();
        state
            .shared
            .iter()
            .find(|s| s.unique_id == unique_id)
            .map(|s| state.hydrated_shared(s))
    }

    /// Every bookkeeping write, in order.
    pub fn saves(&self) -> Vec<(ChannelKey, PushState)> {
        self.state.lock().unwrap().saves.clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }

    /// Number of entity loads served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn channels(&self) -> Result<Vec<Channel>, StoreError> {
        self.record_load();
        let state = self.state.lock().unwrap();
        Ok(state
            .channels
            .iter()
            .map(|c| state.hydrated_channel(c))
            .collect())
    }

    async fn shared_channels(&self) -> Result<Vec<SharedChannel>, StoreError> {
        self.record_load();
        let state = self.state.lock().unwrap();
        Ok(state.shared.iter().map(|s| state.hydrated_shared(s)).collect())
    }

    async fn screen(&self, id: i64) -> Result<Option<Screen>, StoreError> {
        self.record_load();
        let state = self.state.lock().unwrap();
        let Some(screen) = state.screens.iter().find(|s| s.id == id) else {
            return Ok(None);
        };

        let mut screen = screen.clone();
        screen.regions = state
            .assignments
            .iter()
            .filter(|a| a.screen_id == id)
            .filter_map(|a| {
                state
                    .region_channel(&a.key)
                    .map(|channel| ChannelScreenRegion {
                        id: a.id,
                        region: a.region,
                        channel,
                    })
            })
            .collect();
        Ok(Some(screen))
    }

    async fn channel(&self, id: i64) -> Result<Option<Channel>, StoreError> {
        self.record_load();
        let state = self.state.lock().unwrap();
        Ok(state
            .channels
            .iter()
            .find(|c| c.id == id)
            .map(|c| state.hydrated_channel(c)))
    }

    async fn save_push_state(
        &self,
        key: &ChannelKey,
        push_state: &PushState,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            return Err(StoreError::Backend("save refused".to_string()));
        }

        let screens = encode_screen_ids(&push_state.screens);
        match key {
            ChannelKey::Owned(id) => {
                if let Some(channel) = state.channels.iter_mut().find(|c| c.id == *id) {
                    channel.last_push_hash = push_state.hash.clone();
                    channel.last_push_screens = screens;
                }
            }
            ChannelKey::Shared(unique_id) => {
                if let Some(shared) = state.shared.iter_mut().find(|s| &s.unique_id == unique_id) {
                    shared.last_push_hash = push_state.hash.clone();
                    shared.last_push_screens = screens;
                }
            }
        }
        state.saves.push((key.clone(), push_state.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Status(u16),
    Fail,
}

#[derive(Default)]
struct TransportState {
    calls: Vec<RecordedCall>,
    outcomes: HashMap<(Method, String), Outcome>,
    status_body: Option<String>,
    remote: BTreeMap<String, Vec<i64>>,
}

impl TransportState {
    fn outcome(&self, method: Method, url: &str) -> Outcome {
        self.outcomes
            .iter()
            .find(|((m, path), _)| *m == method && url.ends_with(path.as_str()))
            .map(|(_, outcome)| *outcome)
            .unwrap_or(Outcome::Status(200))
    }

    fn status_body(&self) -> String {
        if let Some(body) = &self.status_body {
            return body.clone();
        }
        let channels: Vec<Value> = self
            .remote
            .iter()
            .map(|(id, screens)| json!({ "id": id, "screens": screens }))
            .collect();
        json!({ "channels": channels }).to_string()
    }

    fn apply(&mut self, method: Method, url: &str, body: Option<&str>) {
        let Some((_, rest)) = url.split_once("/channel/") else {
            return;
        };
        let parts: Vec<&str> = rest.split('/').collect();
        match (method, parts.as_slice()) {
            (Method::Post, [id]) => {
                let screens = body
                    .and_then(|b| serde_json::from_str::<Value>(b).ok())
                    .map(|v| normalize_screen_ids(&v["screens"]))
                    .unwrap_or_default();
                self.remote.insert(id.to_string(), screens);
            }
            (Method::Delete, [id]) => {
                self.remote.remove(*id);
            }
            (Method::Delete, [id, "screen", screen_id]) => {
                if let (Some(screens), Ok(screen_id)) =
                    (self.remote.get_mut(*id), screen_id.parse::<i64>())
                {
                    screens.retain(|s| *s != screen_id);
                }
            }
            _ => {}
        }
    }
}

/// Fake middleware. Answers 200 unless told otherwise and keeps the channel
/// to screens map that `GET /status/channels/{key}` reports.
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<TransportState>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose url ends with `path` with `status`.
    pub fn respond(&self, method: Method, path: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert((method, path.to_string()), Outcome::Status(status));
    }

    /// Fail requests whose url ends with `path` at the network level.
    pub fn fail(&self, method: Method, path: &str) {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert((method, path.to_string()), Outcome::Fail);
    }

    pub fn clear_outcomes(&self) {
        self.state.lock().unwrap().outcomes.clear();
    }

    /// Fixed body for the status route instead of the tracked channel map.
    pub fn set_status_body(&self, body: &str) {
        self.state.lock().unwrap().status_body = Some(body.to_string());
    }

    pub fn seed_remote(&self, channel_id: &str, screens: Vec<i64>) {
        self.state
            .lock()
            .unwrap()
            .remote
            .insert(channel_id.to_string(), screens);
    }

    pub fn remote_channels(&self) -> BTreeMap<String, Vec<i64>> {
        self.state.lock().unwrap().remote.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than the status fetch.
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method != Method::Get)
            .collect()
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl MiddlewareTransport for RecordingTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<TransportResponse, MiddlewareError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.clone(),
        });

        match state.outcome(method, url) {
            Outcome::Fail => Err(MiddlewareError::Transport("connection refused".to_string())),
            Outcome::Status(200) => {
                let body_out = if method == Method::Get && url.contains("/status/channels/") {
                    state.status_body()
                } else {
                    String::new()
                };
                state.apply(method, url, body.as_deref());
                Ok(TransportResponse {
                    status: 200,
                    body: body_out,
                })
            }
            Outcome::Status(status) => Ok(TransportResponse {
                status,
                body: String::new(),
            }),
        }
    }
}

pub mod fixtures {
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use crate::hash::shared_channel_unique_id;
    use crate::types::{Channel, Screen, ScreenTemplate, SharedChannel, Slide};

    pub fn slide(id: i64) -> Slide {
        Slide {
            id,
            title: format!("Slide {}", id),
            template: "only-image".to_string(),
            options: json!({ "fontsize": 32 }),
            media_type: Some("image".to_string()),
            duration: Some(15),
            published: true,
            schedule_from: None,
            schedule_to: None,
            external_data: None,
            modified_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn channel(id: i64, title: &str) -> Channel {
        Channel {
            id,
            title: title.to_string(),
            slides: vec![slide(id * 10 + 1), slide(id * 10 + 2)],
            sharing_indexes: Vec::new(),
            regions: Vec::new(),
            last_push_hash: None,
            last_push_screens: Value::Null,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            modified_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn shared_channel(unique_id: &str) -> SharedChannel {
        let content = json!({
            "id": 99,
            "title": format!("Shared {}", unique_id),
            "slides": json!([{ "id": 1, "title": "Shared slide" }]).to_string(),
        });
        SharedChannel {
            unique_id: unique_id.to_string(),
            index_key: "city".to_string(),
            content: content.to_string(),
            regions: Vec::new(),
            last_push_hash: None,
            last_push_screens: Value::Null,
            modified_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    /// Shared channel as imported from the sharing service, keyed by the id
    /// derived from the sharing credentials and source channel id.
    pub fn shared_channel_from_source(api_key: &str, secret: &str, channel_id: &str) -> SharedChannel {
        shared_channel(&shared_channel_unique_id(api_key, secret, channel_id))
    }

    pub fn screen(id: i64) -> Screen {
        Screen {
            id,
            title: format!("Screen {}", id),
            description: Some("Entrance hall".to_string()),
            options: json!({}),
            template: ScreenTemplate {
                id: "two-split".to_string(),
                name: "Two split".to_string(),
                orientation: Some("landscape".to_string()),
                options: json!({}),
            },
            activation_code: Some("12345678".to_string()),
            regions: Vec::new(),
            modified_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }
}
