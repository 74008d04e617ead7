//! Client side of the middleware HTTP contract.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::legacy::normalize_screen_ids;
use crate::payload::screen_data;
use crate::types::{ChannelKey, Screen};

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("middleware returned HTTP {0}")]
    Status(u16),
    #[error("middleware request failed: {0}")]
    Transport(String),
    #[error("malformed middleware status: {0}")]
    MalformedState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One HTTP exchange with the middleware. Network failures surface as
/// [`MiddlewareError::Transport`]; any status is returned as-is.
#[async_trait]
pub trait MiddlewareTransport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<TransportResponse, MiddlewareError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, MiddlewareError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MiddlewareError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MiddlewareTransport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<TransportResponse, MiddlewareError> {
        let mut req = self
            .client
            .request(method.into(), url)
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            req = req.body(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|err| MiddlewareError::Transport(err.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|err| MiddlewareError::Transport(err.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteChannel {
    pub id: Value,
    #[serde(default)]
    pub screens: Value,
}

impl RemoteChannel {
    /// The middleware may report ids as numbers or strings.
    pub fn id(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }

    pub fn screen_ids(&self) -> Vec<i64> {
        normalize_screen_ids(&self.screens)
    }
}

/// What the middleware reports it currently holds.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteState {
    pub channels: Vec<RemoteChannel>,
}

impl RemoteState {
    pub fn screens_for(&self, key: &ChannelKey) -> Option<Vec<i64>> {
        let id = key.to_string();
        self.channels
            .iter()
            .rev()
            .find(|channel| channel.id() == id)
            .map(RemoteChannel::screen_ids)
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.channels.iter().map(RemoteChannel::id).collect()
    }
}

/// Typed operations over the middleware routes. Only HTTP 200 is success.
#[derive(Clone)]
pub struct MiddlewareClient {
    transport: Arc<dyn MiddlewareTransport>,
    base_url: String,
}

impl MiddlewareClient {
    pub fn new(transport: Arc<dyn MiddlewareTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<TransportResponse, MiddlewareError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.transport.send(method, &url, body).await?;
        debug!(%method, %url, status = resp.status, "middleware call");
        if resp.status == 200 {
            Ok(resp)
        } else {
            Err(MiddlewareError::Status(resp.status))
        }
    }

    pub async fn channel_status(&self, api_key: &str) -> Result<RemoteState, MiddlewareError> {
        let resp = self
            .call(Method::Get, &format!("/status/channels/{}", api_key), None)
            .await?;
        serde_json::from_str(&resp.body)
            .map_err(|err| MiddlewareError::MalformedState(err.to_string()))
    }

    pub async fn push_channel(&self, key: &ChannelKey, payload: &str) -> Result<(), MiddlewareError> {
        self.call(
            Method::Post,
            &format!("/channel/{}", key),
            Some(payload.to_string()),
        )
        .await
        .map(|_| ())
    }

    /// Removes the channel from every screen the middleware shows it on.
    pub async fn remove_channel(&self, channel_id: &str) -> Result<(), MiddlewareError> {
        self.call(Method::Delete, &format!("/channel/{}", channel_id), None)
            .await
            .map(|_| ())
    }

    pub async fn remove_channel_from_screen(
        &self,
        key: &ChannelKey,
        screen_id: i64,
    ) -> Result<(), MiddlewareError> {
        self.call(
            Method::Delete,
            &format!("/channel/{}/screen/{}", key, screen_id),
            None,
        )
        .await
        .map(|_| ())
    }

    pub async fn push_screen(&self, screen: &Screen) -> Result<(), MiddlewareError> {
        self.call(
            Method::Put,
            &format!("/screen/{}", screen.id),
            Some(screen_data(screen).to_string()),
        )
        .await
        .map(|_| ())
    }

    pub async fn reload_screen(&self, screen_id: i64) -> Result<(), MiddlewareError> {
        self.call(
            Method::Post,
            &format!("/screen/{}/reload", screen_id),
            Some(json!({ "id": screen_id }).to_string()),
        )
        .await
        .map(|_| ())
    }

    pub async fn remove_screen(
        &self,
        screen_id: i64,
        activation_code: &str,
    ) -> Result<(), MiddlewareError> {
        self.call(
            Method::Delete,
            &format!("/screen/{}/{}", screen_id, activation_code),
            Some(json!({ "id": screen_id }).to_string()),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, RecordingTransport};

    const BASE: &str = "http://mw.test/api";

    fn client(transport: Arc<RecordingTransport>) -> MiddlewareClient {
        MiddlewareClient::new(transport, BASE)
    }

    #[tokio::test]
    async fn test_channel_status_parses_channels() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_status_body(r#"{"channels":[{"id":7,"screens":[1,2]},{"id":"abc","screens":["3"]}]}"#);

        let state = client(transport.clone()).channel_status("key").await.unwrap();

        assert_eq!(state.channel_ids(), vec!["7", "abc"]);
        assert_eq!(state.screens_for(&ChannelKey::Owned(7)), Some(vec![1, 2]));
        assert_eq!(
            state.screens_for(&ChannelKey::Shared("abc".to_string())),
            Some(vec![3])
        );
        assert_eq!(state.screens_for(&ChannelKey::Owned(8)), None);
        assert_eq!(transport.calls()[0].url, "http://mw.test/api/status/channels/key");
    }

    #[tokio::test]
    async fn test_channel_status_malformed_body() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_status_body("<html>oops</html>");

        let result = client(transport).channel_status("key").await;
        assert!(matches!(result, Err(MiddlewareError::MalformedState(_))));
    }

    #[tokio::test]
    async fn test_only_200_is_success() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(Method::Post, "/channel/7", 201);

        let result = client(transport)
            .push_channel(&ChannelKey::Owned(7), "{}")
            .await;
        assert!(matches!(result, Err(MiddlewareError::Status(201))));
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail(Method::Delete, "/channel/7");

        let result = client(transport).remove_channel("7").await;
        assert!(matches!(result, Err(MiddlewareError::Transport(_))));
    }

    #[tokio::test]
    async fn test_routes() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client(transport.clone());
        let shared = ChannelKey::Shared("u1".to_string());

        client.push_channel(&shared, r#"{"id":"u1"}"#).await.unwrap();
        client.remove_channel_from_screen(&shared, 4).await.unwrap();
        client.remove_channel("u1").await.unwrap();
        client.push_screen(&fixtures::screen(9)).await.unwrap();
        client.reload_screen(9).await.unwrap();
        client.remove_screen(9, "12345678").await.unwrap();

        let calls: Vec<String> = transport
            .calls()
            .iter()
            .map(|call| format!("{} {}", call.method, call.url))
            .collect();
        assert_eq!(
            calls,
            vec![
                "POST http://mw.test/api/channel/u1",
                "DELETE http://mw.test/api/channel/u1/screen/4",
                "DELETE http://mw.test/api/channel/u1",
                "PUT http://mw.test/api/screen/9",
                "POST http://mw.test/api/screen/9/reload",
                "DELETE http://mw.test/api/screen/9/12345678",
            ]
        );
    }

    #[tokio::test]
    async fn test_push_screen_body() {
        let transport = Arc::new(RecordingTransport::new());
        client(transport.clone())
            .push_screen(&fixtures::screen(9))
            .await
            .unwrap();

        let body: Value =
            serde_json::from_str(transport.calls()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], 9);
        assert!(body.get("title").is_some());
        assert!(body.get("options").is_some());
        assert!(body["template"].get("id").is_some());
        assert!(body.get("description").is_none());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(reqwest::Method::from(Method::Put), reqwest::Method::PUT);
    }
}
