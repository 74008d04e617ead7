use std::collections::HashSet;
use std::sync::Arc;

use signage_core::events::{PushListener, PushTarget};
use signage_core::hash::fingerprint;
use signage_core::legacy::normalize_screen_ids;
use signage_core::middleware::{MiddlewareClient, RemoteState};
use signage_core::payload::{channel_payload, screen_ids_from_payload, shared_channel_payload};
use signage_core::store::{ContentStore, StoreError};
use signage_core::types::{ChannelKey, PushState};
use tracing::{debug, error, info, warn};

/// Counters for one push cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub detached_screens: usize,
    pub skipped: usize,
    pub failures: usize,
    pub orphans_removed: usize,
}

pub struct PushReconciler {
    store: Arc<dyn ContentStore>,
    client: MiddlewareClient,
    api_key: String,
    listeners: Vec<Arc<dyn PushListener>>,
}

impl PushReconciler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        client: MiddlewareClient,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            client,
            api_key: api_key.into(),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn PushListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Brings the middleware in line with the current channel assignments.
    ///
    /// Middleware failures are recorded in the channel bookkeeping so the
    /// next cycle retries them. Store failures end the cycle.
    pub async fn push_to_screens(&self, force: bool) -> Result<PushReport, StoreError> {
        let mut report = PushReport::default();

        let remote = match self.client.channel_status(&self.api_key).await {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(error = %err, "middleware status unavailable, using local bookkeeping");
                None
            }
        };

        let mut targets: Vec<PushTarget> = self
            .store
            .channels()
            .await?
            .into_iter()
            .map(PushTarget::Channel)
            .chain(
                self.store
                    .shared_channels()
                    .await?
                    .into_iter()
                    .map(PushTarget::Shared),
            )
            .collect();

        for listener in &self.listeners {
            listener.pre_push_channels(&mut targets);
        }

        let mut in_backend = HashSet::new();
        for target in &targets {
            let key = target.key();
            in_backend.insert(key.to_string());
            self.push_target(target, &key, remote.as_ref(), force, &mut report)
                .await?;
        }

        if let Some(remote) = &remote {
            self.remove_orphans(remote, &in_backend, &mut report).await;
        }

        for listener in &self.listeners {
            listener.post_push_channels();
        }

        info!(
            pushed = report.pushed,
            unchanged = report.unchanged,
            deleted = report.deleted,
            detached_screens = report.detached_screens,
            skipped = report.skipped,
            failures = report.failures,
            orphans_removed = report.orphans_removed,
            "push cycle finished"
        );

        Ok(report)
    }

    async fn push_target(
        &self,
        target: &PushTarget,
        key: &ChannelKey,
        remote: Option<&RemoteState>,
        force: bool,
        report: &mut PushReport,
    ) -> Result<(), StoreError> {
        let envelope = match target {
            PushTarget::Channel(channel) => channel_payload(channel),
            PushTarget::Shared(shared) => match shared_channel_payload(shared) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(channel = %key, error = %err, "skipping shared channel");
                    report.skipped += 1;
                    return Ok(());
                }
            },
        };
        let computed_screens = normalize_screen_ids(&envelope["screens"]);

        let mut payload = envelope.to_string();
        for listener in &self.listeners {
            listener.pre_push_channel(key, &mut payload);
        }
        let screen_ids = screen_ids_from_payload(&payload).unwrap_or(computed_screens);

        let last_push_screens = match remote {
            Some(remote) => remote.screens_for(key).unwrap_or_default(),
            None => normalize_screen_ids(target.last_push_screens()),
        };
        let sha1 = fingerprint(payload.as_bytes());

        let required = force
            || target.last_push_hash() != Some(sha1.as_str())
            || screen_ids != last_push_screens;
        if !required {
            debug!(channel = %key, "channel unchanged");
            report.unchanged += 1;
            return Ok(());
        }

        let failed = PushState {
            hash: None,
            screens: last_push_screens.clone(),
        };

        if screen_ids.is_empty() {
            if target.last_push_hash().is_none() && last_push_screens.is_empty() {
                report.unchanged += 1;
                return Ok(());
            }

            let state = match self.client.remove_channel(&key.to_string()).await {
                Ok(()) => {
                    info!(channel = %key, "channel removed from middleware");
                    report.deleted += 1;
                    PushState {
                        hash: Some(sha1),
                        screens: Vec::new(),
                    }
                }
                Err(err) => {
                    error!(channel = %key, error = %err, "channel removal failed");
                    report.failures += 1;
                    failed
                }
            };
            return self.store.save_push_state(key, &state).await;
        }

        if let Err(err) = self.client.push_channel(key, &payload).await {
            error!(channel = %key, error = %err, "channel push failed");
            report.failures += 1;
            return self.store.save_push_state(key, &failed).await;
        }
        report.pushed += 1;
        info!(channel = %key, screens = ?screen_ids, "channel pushed");

        let mut detached = true;
        for screen_id in last_push_screens.iter().filter(|id| !screen_ids.contains(*id)) {
            match self.client.remove_channel_from_screen(key, *screen_id).await {
                Ok(()) => report.detached_screens += 1,
                Err(err) => {
                    error!(channel = %key, screen_id, error = %err, "screen detach failed");
                    report.failures += 1;
                    detached = false;
                }
            }
        }

        let state = if detached {
            PushState {
                hash: Some(sha1),
                screens: screen_ids,
            }
        } else {
            failed
        };
        self.store.save_push_state(key, &state).await
    }

    async fn remove_orphans(
        &self,
        remote: &RemoteState,
        in_backend: &HashSet<String>,
        report: &mut PushReport,
    ) {
        for channel_id in remote.channel_ids() {
            if in_backend.contains(&channel_id) {
                continue;
            }
            match self.client.remove_channel(&channel_id).await {
                Ok(()) => {
                    info!(channel = %channel_id, "orphaned channel removed");
                    report.orphans_removed += 1;
                }
                Err(err) => {
                    warn!(channel = %channel_id, error = %err, "orphaned channel removal failed");
                    report.failures += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use signage_core::hash::shared_channel_unique_id;
    use signage_core::middleware::Method;
    use signage_core::testing::{fixtures, InMemoryStore, RecordingTransport};
    use std::sync::Mutex;

    const BASE: &str = "http://mw.test/api";

    struct Harness {
        store: Arc<InMemoryStore>,
        transport: Arc<RecordingTransport>,
        reconciler: PushReconciler,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let client = MiddlewareClient::new(transport.clone(), BASE);
        let reconciler = PushReconciler::new(store.clone(), client, "key");
        Harness {
            store,
            transport,
            reconciler,
        }
    }

    fn with_channel(h: &Harness, id: i64, screens: &[i64]) {
        h.store.add_channel(fixtures::channel(id, &format!("Channel {}", id)));
        for screen_id in screens {
            h.store.assign(*screen_id, 1, ChannelKey::Owned(id));
        }
    }

    fn mutation_lines(transport: &RecordingTransport) -> Vec<String> {
        transport
            .mutations()
            .iter()
            .map(|call| format!("{} {}", call.method, call.url.trim_start_matches(BASE)))
            .collect()
    }

    fn owned_hash(store: &InMemoryStore, id: i64) -> String {
        let channel = store.channel_record(id).unwrap();
        fingerprint(channel_payload(&channel).to_string().as_bytes())
    }

    #[tokio::test]
    async fn test_first_push_posts_and_records_state() {
        let h = harness();
        with_channel(&h, 1, &[5]);

        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/1"]);
        assert_eq!(
            h.store.saves(),
            vec![(
                ChannelKey::Owned(1),
                PushState {
                    hash: Some(owned_hash(&h.store, 1)),
                    screens: vec![5],
                }
            )]
        );
        assert_eq!(h.store.channel_record(1).unwrap().last_push_screens, json!([5]));
    }

    #[tokio::test]
    async fn test_second_cycle_is_idempotent() {
        let h = harness();
        with_channel(&h, 1, &[5, 6]);

        h.reconciler.push_to_screens(false).await.unwrap();
        h.transport.reset_calls();
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert!(h.transport.mutations().is_empty());
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.pushed, 0);
    }

    #[tokio::test]
    async fn test_rendered_change_triggers_push() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.reconciler.push_to_screens(false).await.unwrap();
        h.transport.reset_calls();

        h.store.update_channel(1, |c| c.title = "Renamed".to_string());
        h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/1"]);
        let body: Value =
            serde_json::from_str(h.transport.mutations()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["data"]["title"], "Renamed");
    }

    #[tokio::test]
    async fn test_bookkeeping_change_does_not_push() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.reconciler.push_to_screens(false).await.unwrap();
        h.transport.reset_calls();

        h.store.update_channel(1, |c| c.modified_at = chrono::Utc::now());
        h.reconciler.push_to_screens(false).await.unwrap();

        assert!(h.transport.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_unassigned_screen_is_detached() {
        let h = harness();
        with_channel(&h, 1, &[5, 6]);
        h.reconciler.push_to_screens(false).await.unwrap();
        h.transport.reset_calls();

        h.store.unassign(6, &ChannelKey::Owned(1));
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(
            mutation_lines(&h.transport),
            vec!["POST /channel/1", "DELETE /channel/1/screen/6"]
        );
        assert_eq!(report.detached_screens, 1);
        let (_, state) = h.store.saves().pop().unwrap();
        assert_eq!(state.screens, vec![5]);
        assert!(state.hash.is_some());
    }

    #[tokio::test]
    async fn test_detach_failure_clears_hash_and_retries() {
        let h = harness();
        with_channel(&h, 1, &[5, 6]);
        h.reconciler.push_to_screens(false).await.unwrap();

        h.store.unassign(6, &ChannelKey::Owned(1));
        h.transport.respond(Method::Delete, "/channel/1/screen/6", 500);
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.failures, 1);
        let (_, state) = h.store.saves().pop().unwrap();
        assert_eq!(state, PushState { hash: None, screens: vec![5, 6] });

        h.transport.clear_outcomes();
        h.transport.reset_calls();
        h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(h.transport.mutations()[0].method, Method::Post);
        let (_, state) = h.store.saves().pop().unwrap();
        assert_eq!(state.hash, Some(owned_hash(&h.store, 1)));
        assert_eq!(state.screens, vec![5]);
    }

    #[tokio::test]
    async fn test_failed_push_clears_hash() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.transport.respond(Method::Post, "/channel/1", 503);

        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(
            h.store.saves(),
            vec![(ChannelKey::Owned(1), PushState { hash: None, screens: vec![] })]
        );

        h.transport.clear_outcomes();
        h.transport.reset_calls();
        let report = h.reconciler.push_to_screens(false).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/1"]);
    }

    #[tokio::test]
    async fn test_emptied_channel_is_deleted_once() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.reconciler.push_to_screens(false).await.unwrap();
        h.transport.reset_calls();

        h.store.unassign(5, &ChannelKey::Owned(1));
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(mutation_lines(&h.transport), vec!["DELETE /channel/1"]);
        let (_, state) = h.store.saves().pop().unwrap();
        assert_eq!(state.screens, Vec::<i64>::new());
        assert_eq!(state.hash, Some(owned_hash(&h.store, 1)));

        h.transport.reset_calls();
        h.reconciler.push_to_screens(false).await.unwrap();
        assert!(h.transport.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_emptied_channel_delete_failure_clears_hash() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.reconciler.push_to_screens(false).await.unwrap();

        h.store.unassign(5, &ChannelKey::Owned(1));
        h.transport.respond(Method::Delete, "/channel/1", 500);
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.deleted, 0);
        let (_, state) = h.store.saves().pop().unwrap();
        assert_eq!(state, PushState { hash: None, screens: vec![5] });

        h.transport.clear_outcomes();
        h.transport.reset_calls();
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(mutation_lines(&h.transport), vec!["DELETE /channel/1"]);
    }

    #[tokio::test]
    async fn test_never_pushed_unassigned_channel_is_left_alone() {
        let h = harness();
        with_channel(&h, 1, &[]);

        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert!(h.transport.mutations().is_empty());
        assert!(h.store.saves().is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn test_orphan_is_deleted_once() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.transport.seed_remote("42", vec![3]);

        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.orphans_removed, 1);
        assert!(mutation_lines(&h.transport).contains(&"DELETE /channel/42".to_string()));
        assert!(!h.transport.remote_channels().contains_key("42"));

        h.transport.reset_calls();
        h.reconciler.push_to_screens(false).await.unwrap();
        assert!(h.transport.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_failure_does_not_abort_cycle() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.transport.seed_remote("42", vec![3]);
        h.transport.fail(Method::Delete, "/channel/42");

        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(report.orphans_removed, 0);
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_status_failure_falls_back_to_local_bookkeeping() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.transport.seed_remote("42", vec![3]);
        h.transport.respond(Method::Get, "/status/channels/key", 500);

        h.reconciler.push_to_screens(false).await.unwrap();
        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/1"]);

        h.transport.reset_calls();
        h.reconciler.push_to_screens(false).await.unwrap();
        assert!(h.transport.mutations().is_empty());
        assert!(h.transport.remote_channels().contains_key("42"));
    }

    #[tokio::test]
    async fn test_malformed_status_falls_back_to_local_bookkeeping() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.transport.set_status_body("<html>");

        let report = h.reconciler.push_to_screens(false).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.orphans_removed, 0);

        h.transport.reset_calls();
        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert!(h.transport.mutations().is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[tokio::test]
    async fn test_legacy_string_screens_match_structured_list() {
        let h = harness();
        with_channel(&h, 1, &[1, 2]);
        h.transport.respond(Method::Get, "/status/channels/key", 500);
        let hash = owned_hash(&h.store, 1);

        for stored in [json!("[1,2]"), json!([1, 2])] {
            let hash = hash.clone();
            h.store.update_channel(1, move |c| {
                c.last_push_hash = Some(hash);
                c.last_push_screens = stored;
            });
            h.transport.reset_calls();

            let report = h.reconciler.push_to_screens(false).await.unwrap();

            assert!(h.transport.mutations().is_empty());
            assert_eq!(report.unchanged, 1);
        }
    }

    #[tokio::test]
    async fn test_undecodable_legacy_screens_trigger_push() {
        let h = harness();
        with_channel(&h, 1, &[1]);
        h.transport.respond(Method::Get, "/status/channels/key", 500);
        let hash = owned_hash(&h.store, 1);
        h.store.update_channel(1, |c| {
            c.last_push_hash = Some(hash);
            c.last_push_screens = json!("not a list");
        });

        h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/1"]);
    }

    #[tokio::test]
    async fn test_force_pushes_unchanged_channels() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.reconciler.push_to_screens(false).await.unwrap();
        h.transport.reset_calls();

        let report = h.reconciler.push_to_screens(true).await.unwrap();

        assert_eq!(report.pushed, 1);
        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/1"]);
    }

    #[tokio::test]
    async fn test_shared_channel_uses_derived_identity() {
        let h = harness();
        let shared = fixtures::shared_channel_from_source("partner", "s3cret", "17");
        let unique_id = shared.unique_id.clone();
        assert_eq!(unique_id, shared_channel_unique_id("partner", "s3cret", "17"));
        assert_eq!(unique_id.len(), 64);
        h.store.add_shared_channel(shared);
        h.store.assign(5, 1, ChannelKey::Shared(unique_id.clone()));

        h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(
            mutation_lines(&h.transport),
            vec![format!("POST /channel/{}", unique_id)]
        );
        assert_eq!(h.transport.remote_channels()[&unique_id], vec![5]);
        let (key, _) = h.store.saves().pop().unwrap();
        assert_eq!(key, ChannelKey::Shared(unique_id));
    }

    #[tokio::test]
    async fn test_shared_channel_is_pushed_under_unique_id() {
        let h = harness();
        h.store.add_shared_channel(fixtures::shared_channel("u1"));
        h.store.assign(5, 2, ChannelKey::Shared("u1".to_string()));

        h.reconciler.push_to_screens(false).await.unwrap();

        let calls = h.transport.mutations();
        assert_eq!(mutation_lines(&h.transport), vec!["POST /channel/u1"]);
        let body: Value = serde_json::from_str(calls[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], "u1");
        assert!(body["data"]["slides"].is_array());
        assert_eq!(body["regions"], json!([{ "screen": 5, "region": 2 }]));

        let (key, state) = h.store.saves().pop().unwrap();
        assert_eq!(key, ChannelKey::Shared("u1".to_string()));
        assert_eq!(state.screens, vec![5]);
    }

    #[tokio::test]
    async fn test_undecodable_shared_channel_is_skipped_not_orphaned() {
        let h = harness();
        let mut shared = fixtures::shared_channel("u1");
        shared.content = "not json".to_string();
        h.store.add_shared_channel(shared);
        h.store.assign(5, 1, ChannelKey::Shared("u1".to_string()));
        h.transport.seed_remote("u1", vec![5]);

        let report = h.reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(h.transport.mutations().is_empty());
        assert!(h.store.saves().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let h = harness();
        with_channel(&h, 1, &[5]);
        h.store.fail_saves(true);

        let result = h.reconciler.push_to_screens(false).await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[derive(Default)]
    struct ScriptedListener {
        events: Mutex<Vec<String>>,
    }

    impl PushListener for ScriptedListener {
        fn pre_push_channels(&self, targets: &mut Vec<PushTarget>) {
            self.events.lock().unwrap().push("pre_push_channels".to_string());
            targets.retain(|t| t.key() != ChannelKey::Owned(2));
        }

        fn pre_push_channel(&self, key: &ChannelKey, payload: &mut String) {
            self.events.lock().unwrap().push(format!("pre_push_channel:{}", key));
            let mut value: Value = serde_json::from_str(payload).unwrap();
            value["screens"] = json!([5, 9]);
            *payload = value.to_string();
        }

        fn post_push_channels(&self) {
            self.events.lock().unwrap().push("post_push_channels".to_string());
        }
    }

    #[tokio::test]
    async fn test_listeners_filter_targets_and_rewrite_payload() {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let listener = Arc::new(ScriptedListener::default());
        let reconciler = PushReconciler::new(
            store.clone(),
            MiddlewareClient::new(transport.clone(), BASE),
            "key",
        )
        .with_listener(listener.clone());

        store.add_channel(fixtures::channel(1, "One"));
        store.add_channel(fixtures::channel(2, "Two"));
        store.assign(5, 1, ChannelKey::Owned(1));
        store.assign(5, 2, ChannelKey::Owned(2));

        reconciler.push_to_screens(false).await.unwrap();

        assert_eq!(
            *listener.events.lock().unwrap(),
            vec![
                "pre_push_channels",
                "pre_push_channel:1",
                "post_push_channels"
            ]
        );
        assert_eq!(mutation_lines(&transport), vec!["POST /channel/1"]);
        let body: Value =
            serde_json::from_str(transport.mutations()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["screens"], json!([5, 9]));

        let (_, state) = store.saves().pop().unwrap();
        assert_eq!(state.screens, vec![5, 9]);
    }
}
