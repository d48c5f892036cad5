//! NotifierService facade
//!
//! Owns the credential store, the count aggregator and the team/icon caches
//! behind one lock, and wires them to the API client, the renderer and the
//! host. The timer, the settings watcher and the stream manager all drive
//! the notifier through this type.

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::badge::{BadgeRenderer, BadgeView, HostSurface, IconBitmap, IconCache, IconLoader};
use crate::counts::CountAggregator;
use crate::credential::{CredentialStore, TokenSource};
use crate::error::{Error, Result};
use crate::host::HostRuntime;
use crate::models::{BadgeTotals, TeamInfo};
use crate::realtime::RtmEvent;
use crate::slack::api::{ConnectResponse, CountsResponse, TeamInfoResponse};
use crate::slack::{SlackApi, methods};

/// Everything that must be reset together when the token changes
struct SessionState {
    credentials: CredentialStore,
    counts: CountAggregator,
    team: Option<TeamInfo>,
    icon: IconCache,
    last_snapshot_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn clear_caches(&mut self) {
        self.counts.clear();
        self.team = None;
        self.icon.clear();
        self.last_snapshot_at = None;
    }
}

/// Main service object of the notifier
pub struct NotifierService {
    api: Arc<dyn SlackApi>,
    icons: Arc<dyn IconLoader>,
    runtime: Arc<dyn HostRuntime>,
    renderer: BadgeRenderer,
    stream_connect_method: String,
    state: Mutex<SessionState>,
    generation_tx: watch::Sender<u64>,
}

impl NotifierService {
    /// Method used to obtain a stream URL unless overridden
    pub const DEFAULT_STREAM_CONNECT_METHOD: &'static str = "rtm.connect";

    /// Create a service. No network traffic happens until the first refresh.
    pub fn new(
        api: Arc<dyn SlackApi>,
        tokens: Box<dyn TokenSource>,
        icons: Arc<dyn IconLoader>,
        surface: Arc<dyn HostSurface>,
        runtime: Arc<dyn HostRuntime>,
    ) -> Self {
        let (generation_tx, _) = watch::channel(0);
        Self {
            api,
            icons,
            runtime,
            renderer: BadgeRenderer::new(surface),
            stream_connect_method: Self::DEFAULT_STREAM_CONNECT_METHOD.to_string(),
            state: Mutex::new(SessionState {
                credentials: CredentialStore::new(tokens),
                counts: CountAggregator::new(),
                team: None,
                icon: IconCache::default(),
                last_snapshot_at: None,
            }),
            generation_tx,
        }
    }

    /// Use a different method (e.g. `rtm.start`) to obtain stream URLs
    pub fn with_stream_connect_method(mut self, method: impl Into<String>) -> Self {
        self.stream_connect_method = method.into();
        self
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Credential
    // ========================================================================

    /// Current credential generation
    pub fn generation(&self) -> u64 {
        self.state().credentials.generation()
    }

    /// Watch credential generations (bumped on every token change)
    pub fn subscribe_generation(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Replace the token and drop every cache in one step.
    ///
    /// Returns `false` if the token is unchanged; nothing is reset then.
    pub fn reset_credential(&self, token: Option<String>) -> bool {
        let generation = {
            let mut state = self.state();
            if !state.credentials.set(token) {
                return false;
            }
            state.clear_caches();
            state.credentials.generation()
        };

        info!("API token changed; cleared counts and team caches (generation {})", generation);
        self.generation_tx.send_replace(generation);
        true
    }

    /// React to a settings change: reset everything, then refresh
    pub async fn on_credential_change(&self, token: Option<String>) -> bool {
        if !self.reset_credential(token) {
            return false;
        }
        self.refresh().await;
        true
    }

    // ========================================================================
    // API access
    // ========================================================================

    /// Authenticated API call on a blocking thread.
    ///
    /// Returns the payload together with the generation the call was made
    /// under, so the caller can drop results that outlived a token change.
    pub async fn call(&self, method: &str, params: Vec<(String, String)>) -> Result<(Value, u64)> {
        let (token, generation) = {
            let mut state = self.state();
            let token = state.credentials.get()?;
            (token, state.credentials.generation())
        };

        let api = Arc::clone(&self.api);
        let task_method = method.to_string();
        let value = tokio::task::spawn_blocking(move || api.call(&token, &task_method, &params))
            .await
            .map_err(|e| Error::transport(method, format!("request task failed: {}", e)))??;

        Ok((value, generation))
    }

    /// One-time realtime URL plus the generation it belongs to
    pub async fn connect_url(&self) -> Result<(String, u64)> {
        let method = self.stream_connect_method.as_str();
        let (json, generation) = self.call(method, Vec::new()).await?;
        let response: ConnectResponse =
            serde_json::from_value(json).map_err(|e| Error::transport(method, e))?;

        let url = url::Url::parse(&response.url).map_err(|e| Error::transport(method, e))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::transport(
                method,
                format!("unsupported stream URL scheme: {}", url.scheme()),
            ));
        }

        Ok((response.url, generation))
    }

    /// Team metadata, fetched once per token
    pub async fn team_info(&self) -> Result<TeamInfo> {
        let cached = self.state().team.clone();
        if let Some(team) = cached {
            return Ok(team);
        }

        let (json, generation) = self.call(methods::TEAM_INFO, Vec::new()).await?;
        let response: TeamInfoResponse = serde_json::from_value(json)
            .map_err(|e| Error::transport(methods::TEAM_INFO, e))?;

        let mut state = self.state();
        if state.credentials.generation() == generation {
            state.team = Some(response.team.clone());
        } else {
            debug!("Not caching team info fetched under an old token");
        }
        Ok(response.team)
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Replace the counts with a fresh `users.counts` snapshot.
    ///
    /// Returns `false` if the snapshot arrived after a token change and was
    /// discarded.
    pub async fn refresh_snapshot(&self) -> Result<bool> {
        let (json, generation) = self.call(methods::USERS_COUNTS, Vec::new()).await?;
        let snapshot: CountsResponse = serde_json::from_value(json)
            .map_err(|e| Error::transport(methods::USERS_COUNTS, e))?;
        Ok(self.apply_snapshot(generation, &snapshot))
    }

    /// Apply a snapshot if it still belongs to the current token
    pub fn apply_snapshot(&self, generation: u64, snapshot: &CountsResponse) -> bool {
        let mut state = self.state();
        if state.credentials.generation() != generation {
            debug!(
                "Discarding counts snapshot from generation {} (current {})",
                generation,
                state.credentials.generation()
            );
            return false;
        }
        state.counts.replace_snapshot(snapshot);
        state.last_snapshot_at = Some(Utc::now());
        true
    }

    /// Periodic update: snapshot, then render. Failures are logged only.
    pub async fn refresh(&self) {
        match self.refresh_snapshot().await {
            Ok(true) => {
                self.render().await;
            }
            Ok(false) => {}
            Err(e) => warn!("Counts refresh failed: {}", e),
        }
    }

    /// Decode and handle one realtime text frame.
    ///
    /// Malformed frames are dropped without touching any state.
    pub async fn handle_frame(&self, generation: u64, text: &str) -> bool {
        match RtmEvent::decode(text) {
            Some(event) => self.handle_event(generation, event).await,
            None => false,
        }
    }

    /// Dispatch one event; re-renders when counts changed.
    ///
    /// Events from a connection opened under an older token are ignored.
    pub async fn handle_event(&self, generation: u64, event: RtmEvent) -> bool {
        let changed = {
            let mut state = self.state();
            if state.credentials.generation() != generation {
                debug!("Ignoring {} from a stale connection", event.kind());
                return false;
            }
            if let RtmEvent::DesktopNotification(notification) = &event {
                debug!("Desktop notification: {}", notification.title);
                self.runtime.notify(notification, state.icon.url());
                return false;
            }
            state.counts.apply_event(&event)
        };

        if changed {
            debug!("Applied {} event", event.kind());
            self.render().await;
        }
        changed
    }

    /// Current aggregate counts
    pub fn totals(&self) -> BadgeTotals {
        self.state().counts.totals()
    }

    /// Snapshot of the aggregator, for inspection
    pub fn counts(&self) -> CountAggregator {
        self.state().counts.clone()
    }

    /// When the last snapshot was applied under the current token
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        self.state().last_snapshot_at
    }

    /// Whether any per-token cache holds data
    pub fn has_cached_state(&self) -> bool {
        let state = self.state();
        !state.counts.is_empty() || state.team.is_some() || !state.icon.is_empty()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Recompute totals and push them to the host.
    ///
    /// The badge text is rendered even if the icon can't be loaded. An icon
    /// loaded under a token that has since been replaced is not shown.
    pub async fn render(&self) -> BadgeView {
        let loaded = match self.ensure_icon().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Team icon unavailable: {:#}", e);
                None
            }
        };

        let state = self.state();
        let icon = match loaded {
            Some((icon, generation)) if generation == state.credentials.generation() => Some(icon),
            Some(_) => {
                debug!("Dropping team icon loaded under an old token");
                None
            }
            None => None,
        };
        self.renderer.render(state.counts.totals(), icon.as_ref())
    }

    /// The cached team icon, loading it on first use.
    ///
    /// Returns the icon with the generation it was loaded under, or `None`
    /// if loading it already failed for this token.
    async fn ensure_icon(&self) -> anyhow::Result<Option<(IconBitmap, u64)>> {
        let (cached, generation) = {
            let state = self.state();
            (state.icon.current().cloned(), state.credentials.generation())
        };
        if let Some(icon) = cached {
            return Ok(Some((icon, generation)));
        }

        let team = self.team_info().await?;
        let url = team
            .icon
            .best_url()
            .context("Team has no icon URL")?
            .to_string();
        if self.state().icon.has_failed(&url) {
            return Ok(None);
        }

        let loader = Arc::clone(&self.icons);
        let fetch_url = url.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&fetch_url))
            .await
            .context("Icon loading task failed")?;

        let mut state = self.state();
        let current = state.credentials.generation() == generation;
        match loaded {
            Ok(icon) => {
                if current {
                    debug!("Cached team icon from {}", url);
                    state.icon.insert(url, icon.clone());
                }
                Ok(Some((icon, generation)))
            }
            Err(e) => {
                if current {
                    state.icon.mark_failed(url.clone());
                }
                Err(e.context(format!("Failed to load team icon from {}", url)))
            }
        }
    }

    /// Last view pushed to the host
    pub fn last_badge(&self) -> Option<BadgeView> {
        self.renderer.last_view()
    }

    /// Forward a liveness signal to the host
    pub fn keep_alive(&self) {
        self.runtime.keep_alive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::BadgeColor;
    use crate::credential::StaticTokenSource;
    use crate::realtime::DesktopNotification;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FakeApi {
        responses: HashMap<&'static str, Value>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeApi {
        fn new() -> Self {
            let mut responses = HashMap::new();
            responses.insert(
                methods::USERS_COUNTS,
                json!({
                    "ok": true,
                    "channels": [
                        { "id": "C1", "unread_count_display": 2, "mention_count_display": 0, "is_muted": false }
                    ]
                }),
            );
            responses.insert(
                methods::TEAM_INFO,
                json!({
                    "ok": true,
                    "team": {
                        "id": "T1",
                        "name": "Acme",
                        "domain": "acme",
                        "icon": { "image_132": "https://example.com/icon.png" }
                    }
                }),
            );
            responses.insert("rtm.connect", json!({ "ok": true, "url": "wss://example.com/rtm" }));
            Self {
                responses,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SlackApi for FakeApi {
        fn call(&self, token: &str, method: &str, _params: &[(String, String)]) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((token.to_string(), method.to_string()));
            self.responses
                .get(method)
                .cloned()
                .ok_or_else(|| Error::Api {
                    method: method.to_string(),
                    code: "unknown_method".to_string(),
                })
        }
    }

    struct SolidIcon;

    impl IconLoader for SolidIcon {
        fn load(&self, _url: &str) -> anyhow::Result<IconBitmap> {
            IconBitmap::from_rgba(1, 1, vec![255, 0, 0, 255])
        }
    }

    #[derive(Default)]
    struct Host {
        texts: Mutex<Vec<String>>,
        colors: Mutex<Vec<BadgeColor>>,
        icons: Mutex<Vec<IconBitmap>>,
        notifications: Mutex<Vec<(String, Option<String>)>>,
    }

    impl HostSurface for Host {
        fn set_icon(&self, icon: &IconBitmap) {
            self.icons.lock().unwrap().push(icon.clone());
        }
        fn set_badge_text(&self, text: &str) {
            self.texts.lock().unwrap().push(text.to_string());
        }
        fn set_badge_color(&self, color: BadgeColor) {
            self.colors.lock().unwrap().push(color);
        }
    }

    impl HostRuntime for Host {
        fn keep_alive(&self) {}
        fn notify(&self, notification: &DesktopNotification, team_icon_url: Option<&str>) {
            self.notifications
                .lock()
                .unwrap()
                .push((notification.title.clone(), team_icon_url.map(str::to_string)));
        }
    }

    /// Team icon URL depends on the token; every token has one unread message
    struct PerTokenTeams;

    impl SlackApi for PerTokenTeams {
        fn call(&self, token: &str, method: &str, _params: &[(String, String)]) -> Result<Value> {
            Ok(match method {
                methods::TEAM_INFO => json!({
                    "ok": true,
                    "team": {
                        "id": token,
                        "name": token,
                        "domain": token,
                        "icon": { "image_132": format!("https://example.com/{}.png", token) }
                    }
                }),
                _ => json!({
                    "ok": true,
                    "channels": [ { "id": "C1", "unread_count_display": 1, "mention_count_display": 0 } ]
                }),
            })
        }
    }

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// The old team's icon is slow and red, any other is blue
    struct SlowOldIcon;

    impl IconLoader for SlowOldIcon {
        fn load(&self, url: &str) -> anyhow::Result<IconBitmap> {
            if url.contains("old") {
                std::thread::sleep(Duration::from_millis(300));
                IconBitmap::from_rgba(1, 1, RED.to_vec())
            } else {
                IconBitmap::from_rgba(1, 1, BLUE.to_vec())
            }
        }
    }

    #[derive(Default)]
    struct FailingIcon {
        attempts: Mutex<usize>,
    }

    impl IconLoader for FailingIcon {
        fn load(&self, url: &str) -> anyhow::Result<IconBitmap> {
            *self.attempts.lock().unwrap() += 1;
            anyhow::bail!("404 for {}", url)
        }
    }

    fn make_service(token: Option<&str>) -> (Arc<FakeApi>, Arc<Host>, NotifierService) {
        let api = Arc::new(FakeApi::new());
        let host = Arc::new(Host::default());
        let service = NotifierService::new(
            api.clone(),
            Box::new(StaticTokenSource(token.map(str::to_string))),
            Arc::new(SolidIcon),
            host.clone(),
            host.clone(),
        );
        (api, host, service)
    }

    #[tokio::test]
    async fn test_refresh_applies_snapshot_and_renders() {
        let (api, host, service) = make_service(Some("xoxp-1"));

        service.refresh().await;

        assert_eq!(service.totals(), BadgeTotals::new(2, 0));
        assert!(service.last_snapshot_at().is_some());
        assert_eq!(*host.texts.lock().unwrap(), vec!["2".to_string()]);
        assert_eq!(*host.colors.lock().unwrap(), vec![BadgeColor::NEUTRAL]);
        // Icon is in color because there is something unread
        assert_eq!(host.icons.lock().unwrap()[0].rgba, vec![255, 0, 0, 255]);

        let calls = api.calls.lock().unwrap();
        assert!(calls.iter().all(|(token, _)| token == "xoxp-1"));
        assert!(calls.iter().any(|(_, m)| m == methods::TEAM_INFO));
    }

    #[tokio::test]
    async fn test_no_credential_halts_refresh() {
        let (api, host, service) = make_service(None);

        assert!(matches!(service.refresh_snapshot().await, Err(Error::NoCredential)));
        service.refresh().await;

        assert!(api.calls.lock().unwrap().is_empty());
        assert!(host.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credential_change_resets_all_caches() {
        let (_api, _host, service) = make_service(Some("xoxp-1"));
        service.refresh().await;
        assert!(service.has_cached_state());

        assert!(service.reset_credential(Some("xoxp-2".into())));
        assert!(!service.has_cached_state());
        assert_eq!(service.totals(), BadgeTotals::default());
        assert_eq!(service.last_snapshot_at(), None);

        // Same token again is not a change
        assert!(!service.reset_credential(Some("xoxp-2".into())));
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_discarded() {
        let (_api, _host, service) = make_service(Some("xoxp-1"));
        let stale_generation = service.generation();
        let mut generations = service.subscribe_generation();

        service.reset_credential(Some("xoxp-2".into()));
        assert!(generations.has_changed().unwrap());

        let snapshot: CountsResponse = serde_json::from_value(json!({
            "channels": [ { "id": "C1", "unread_count_display": 9, "mention_count_display": 9 } ]
        }))
        .unwrap();
        assert!(!service.apply_snapshot(stale_generation, &snapshot));
        assert!(!service.has_cached_state());

        assert!(service.apply_snapshot(service.generation(), &snapshot));
        assert_eq!(service.totals(), BadgeTotals::new(9, 9));
    }

    #[tokio::test]
    async fn test_frames_update_counts_and_badge() {
        let (_api, host, service) = make_service(Some("xoxp-1"));
        service.refresh().await;
        let generation = service.generation();

        let changed = service
            .handle_frame(
                generation,
                r#"{"type":"group_marked","channel":"C1","unread_count_display":0,"mention_count_display":1}"#,
            )
            .await;
        assert!(changed);
        assert_eq!(service.totals(), BadgeTotals::new(0, 1));
        assert_eq!(host.texts.lock().unwrap().last().unwrap(), "1");
        assert_eq!(*host.colors.lock().unwrap().last().unwrap(), BadgeColor::ALERT);

        // Malformed and stale frames change nothing
        assert!(!service.handle_frame(generation, "{{garbage").await);
        assert!(
            !service
                .handle_frame(
                    generation + 1,
                    r#"{"type":"channel_marked","channel":"C1","unread_count_display":5,"mention_count_display":5}"#,
                )
                .await
        );
        assert_eq!(service.totals(), BadgeTotals::new(0, 1));
    }

    #[tokio::test]
    async fn test_desktop_notification_reaches_host() {
        let (_api, host, service) = make_service(Some("xoxp-1"));
        service.refresh().await;

        service
            .handle_frame(
                service.generation(),
                r#"{"type":"desktop_notification","title":"Acme","content":"hello"}"#,
            )
            .await;

        let notifications = host.notifications.lock().unwrap();
        assert_eq!(
            *notifications,
            vec![("Acme".to_string(), Some("https://example.com/icon.png".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_connect_url_validates_scheme() {
        let (_api, _host, service) = make_service(Some("xoxp-1"));
        let (url, generation) = service.connect_url().await.unwrap();
        assert_eq!(url, "wss://example.com/rtm");
        assert_eq!(generation, service.generation());

        let (_api, _host, service) = make_service(Some("xoxp-1"));
        let service = service.with_stream_connect_method(methods::TEAM_INFO);
        assert!(matches!(
            service.connect_url().await,
            Err(Error::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_icon_loaded_under_old_token_is_not_rendered() {
        let host = Arc::new(Host::default());
        let service = Arc::new(NotifierService::new(
            Arc::new(PerTokenTeams),
            Box::new(StaticTokenSource(Some("xoxp-old".into()))),
            Arc::new(SlowOldIcon),
            host.clone(),
            host.clone(),
        ));

        let stale = tokio::spawn({
            let service = service.clone();
            async move { service.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.on_credential_change(Some("xoxp-new".into())).await);
        stale.await.unwrap();

        let icons: Vec<Vec<u8>> = host.icons.lock().unwrap().iter().map(|i| i.rgba.clone()).collect();
        assert_eq!(icons, vec![BLUE.to_vec()]);
        // The late render still showed the current counts
        assert_eq!(*host.texts.lock().unwrap(), vec!["1".to_string(), "1".to_string()]);

        service.render().await;
        assert_eq!(host.icons.lock().unwrap().last().unwrap().rgba, BLUE.to_vec());
    }

    #[tokio::test]
    async fn test_notification_from_stale_connection_is_dropped() {
        let (_api, host, service) = make_service(Some("xoxp-1"));
        let old_generation = service.generation();
        service.reset_credential(Some("xoxp-2".into()));

        let frame = r#"{"type":"desktop_notification","title":"Acme","content":"hello"}"#;
        service.handle_frame(old_generation, frame).await;
        assert!(host.notifications.lock().unwrap().is_empty());

        service.handle_frame(service.generation(), frame).await;
        assert_eq!(host.notifications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_icon_is_not_refetched_until_token_changes() {
        let api = Arc::new(FakeApi::new());
        let host = Arc::new(Host::default());
        let icons = Arc::new(FailingIcon::default());
        let service = NotifierService::new(
            api,
            Box::new(StaticTokenSource(Some("xoxp-1".into()))),
            icons.clone(),
            host.clone(),
            host.clone(),
        );

        service.refresh().await;
        let generation = service.generation();
        for unread in [3, 4] {
            let frame = format!(
                r#"{{"type":"channel_marked","channel":"C1","unread_count_display":{},"mention_count_display":0}}"#,
                unread
            );
            assert!(service.handle_frame(generation, &frame).await);
        }

        assert_eq!(*icons.attempts.lock().unwrap(), 1);
        assert!(host.icons.lock().unwrap().is_empty());
        assert_eq!(host.texts.lock().unwrap().last().unwrap(), "4");

        service.on_credential_change(Some("xoxp-2".into())).await;
        assert_eq!(*icons.attempts.lock().unwrap(), 2);
    }
}
