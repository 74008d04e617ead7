//! Middleware payload serialization.
//!
//! Only fields the middleware renders are written here. Editor bookkeeping
//! (`created_at`, `modified_at`, push state) stays out so it never affects
//! the push fingerprint.

use serde_json::{json, Value};
use thiserror::Error;

use crate::legacy::normalize_screen_ids;
use crate::types::{screen_ids, Channel, ChannelKey, Screen, ScreenRegion, SharedChannel, Slide};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid shared channel content for {unique_id}: {reason}")]
    SharedContent { unique_id: String, reason: String },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub fn slide_data(slide: &Slide) -> Value {
    json!({
        "id": slide.id,
        "title": &slide.title,
        "template": &slide.template,
        "options": &slide.options,
        "media_type": &slide.media_type,
        "duration": slide.duration,
        "published": slide.published,
        "schedule_from": slide.schedule_from.map(|t| t.timestamp()),
        "schedule_to": slide.schedule_to.map(|t| t.timestamp()),
        "external_data": &slide.external_data,
    })
}

pub fn channel_data(channel: &Channel) -> Value {
    json!({
        "id": channel.id,
        "title": &channel.title,
        "slides": channel.slides.iter().map(slide_data).collect::<Vec<_>>(),
        "sharing_indexes": channel
            .sharing_indexes
            .iter()
            .map(|index| json!({
                "id": index.id,
                "name": &index.name,
                "index": &index.index_key,
            }))
            .collect::<Vec<_>>(),
    })
}

/// Decodes shared channel content. The sharing service stores `slides` as a
/// JSON string inside the JSON document, so it is decoded a second time.
pub fn shared_channel_data(shared: &SharedChannel) -> Result<Value, PayloadError> {
    let invalid = |reason: String| PayloadError::SharedContent {
        unique_id: shared.unique_id.clone(),
        reason,
    };

    let mut data: Value =
        serde_json::from_str(&shared.content).map_err(|err| invalid(err.to_string()))?;
    let object = data
        .as_object_mut()
        .ok_or_else(|| invalid("content is not an object".to_string()))?;

    if let Some(Value::String(encoded)) = object.get("slides") {
        let slides: Value = serde_json::from_str(encoded)
            .map_err(|err| invalid(format!("slides: {}", err)))?;
        object.insert("slides".to_string(), slides);
    }

    Ok(data)
}

fn regions_data(regions: &[ScreenRegion]) -> Value {
    Value::Array(
        regions
            .iter()
            .map(|r| json!({ "screen": r.screen_id, "region": r.region }))
            .collect(),
    )
}

fn envelope(key: &ChannelKey, data: Value, regions: &[ScreenRegion]) -> Value {
    json!({
        "id": key.to_json(),
        "data": data,
        "screens": screen_ids(regions),
        "regions": regions_data(regions),
    })
}

pub fn channel_payload(channel: &Channel) -> Value {
    envelope(
        &ChannelKey::Owned(channel.id),
        channel_data(channel),
        &channel.regions,
    )
}

pub fn shared_channel_payload(shared: &SharedChannel) -> Result<Value, PayloadError> {
    Ok(envelope(
        &ChannelKey::Shared(shared.unique_id.clone()),
        shared_channel_data(shared)?,
        &shared.regions,
    ))
}

/// Screen document sent with `PUT /screen/{id}` and used as the projection header.
pub fn screen_data(screen: &Screen) -> Value {
    json!({
        "id": screen.id,
        "title": &screen.title,
        "options": &screen.options,
        "template": {
            "id": &screen.template.id,
            "name": &screen.template.name,
            "orientation": &screen.template.orientation,
            "options": &screen.template.options,
        },
    })
}

/// Reads the `screens` member back out of a serialized channel payload.
pub fn screen_ids_from_payload(payload: &str) -> Option<Vec<i64>> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value.get("screens").map(normalize_screen_ids)
}
