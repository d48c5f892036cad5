//! Realtime stream lifecycle
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`, forever. Each
//! session fetches a fresh one-time URL, so a reconnect always goes back
//! through the API.

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::connection::{StreamConnector, StreamEvent};
use crate::error::Error;
use crate::service::NotifierService;

/// How often the host gets a liveness signal while connected
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Connection state of the realtime stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Delay before the next connection attempt
///
/// A session that reached `Connected` is followed by an immediate reconnect.
/// Consecutive failed attempts back off exponentially up to `max`. There is
/// no attempt limit.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            failures: 0,
        }
    }

    /// Delay after a session ended. `was_connected` resets the backoff.
    pub fn next_delay(&mut self, was_connected: bool) -> Duration {
        if was_connected {
            self.failures = 0;
            return Duration::ZERO;
        }

        self.failures = self.failures.saturating_add(1);
        let exponent = (self.failures - 1).min(16);
        self.initial.saturating_mul(1 << exponent).min(self.max)
    }

    /// Forget previous failures
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Failed attempts since the last successful connection
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Never got to `Connected`
    ConnectFailed(Error),
    /// Was connected, then the stream closed or errored
    Disconnected(Error),
    /// The token changed; the stream belongs to the old one
    CredentialChanged,
    /// Shutdown requested
    Shutdown,
}

impl SessionEnd {
    fn was_connected(&self) -> bool {
        matches!(self, SessionEnd::Disconnected(_))
    }
}

/// Owns the realtime connection and keeps it open
pub struct StreamManager {
    service: Arc<NotifierService>,
    connector: Arc<dyn StreamConnector>,
    policy: ReconnectPolicy,
    keep_alive_interval: Duration,
    state_tx: watch::Sender<ConnectionState>,
}

impl StreamManager {
    pub fn new(service: Arc<NotifierService>, connector: Arc<dyn StreamConnector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            service,
            connector,
            policy: ReconnectPolicy::default(),
            keep_alive_interval: KEEP_ALIVE_INTERVAL,
            state_tx,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Liveness signal period, at least one second
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval.max(MIN_KEEP_ALIVE_INTERVAL);
        self
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Keep the stream open until `shutdown` becomes `true` (or its sender
    /// is dropped).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut generations = self.service.subscribe_generation();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let end = self.run_session(&mut generations, &mut shutdown).await;
            self.set_state(ConnectionState::Disconnected);

            let delay = match &end {
                SessionEnd::Shutdown => break,
                SessionEnd::CredentialChanged => {
                    info!(target: "Realtime", "Token changed, reconnecting");
                    self.policy.reset();
                    continue;
                }
                SessionEnd::Disconnected(e) => {
                    info!(target: "Realtime", "{}", e);
                    self.policy.next_delay(end.was_connected())
                }
                SessionEnd::ConnectFailed(e) => {
                    warn!(target: "Realtime", "Connection attempt failed: {}", e);
                    self.policy.next_delay(end.was_connected())
                }
            };

            if delay.is_zero() {
                continue;
            }

            debug!(
                target: "Realtime",
                "Reconnecting in {:?} (failure #{})",
                delay,
                self.policy.failures()
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = generations.changed() => {
                    if changed.is_ok() {
                        self.policy.reset();
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// One connect-and-read cycle
    pub async fn run_session(
        &mut self,
        generations: &mut watch::Receiver<u64>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        self.set_state(ConnectionState::Connecting);
        generations.borrow_and_update();

        let (url, generation) = match self.service.connect_url().await {
            Ok(v) => v,
            Err(e) => return SessionEnd::ConnectFailed(e),
        };

        let mut frames = match self.connector.connect(&url).await {
            Ok(frames) => frames,
            Err(e) => return SessionEnd::ConnectFailed(e),
        };

        self.set_state(ConnectionState::Connected);
        info!(target: "Realtime", "Realtime stream connected");
        self.service.keep_alive();

        let mut keep_alive = tokio::time::interval(self.keep_alive_interval);
        // The first tick completes immediately; the signal above covers it
        keep_alive.tick().await;

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(StreamEvent::Text(text)) => {
                        self.service.handle_frame(generation, &text).await;
                    }
                    Some(StreamEvent::Closed { reason }) => {
                        let reason = reason.unwrap_or_else(|| "closed by peer".to_string());
                        return SessionEnd::Disconnected(Error::stream(reason));
                    }
                    Some(StreamEvent::Error(e)) => {
                        return SessionEnd::Disconnected(Error::stream(e));
                    }
                    None => {
                        return SessionEnd::Disconnected(Error::stream("connection dropped"));
                    }
                },
                _ = keep_alive.tick() => self.service.keep_alive(),
                _ = generations.changed() => return SessionEnd::CredentialChanged,
                _ = shutdown.changed() => return SessionEnd::Shutdown,
            }
        }
    }
}
