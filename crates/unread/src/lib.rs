//! Unread crate - Slack unread/mention badge logic
//!
//! This crate provides the host-independent core of the badge notifier:
//! - Credential store with a generation counter for token changes
//! - Slack Web API client with envelope validation
//! - Count aggregation from `users.counts` snapshots and realtime events
//! - Realtime stream manager with reconnect backoff
//! - Badge rendering (team icon, text, color)
//! - The open-team action
//!
//! The host (toolbar, notifications, tabs) is reached only through the
//! traits in [`host`] and [`badge::HostSurface`].

pub mod actions;
pub mod badge;
pub mod config;
pub mod counts;
pub mod credential;
pub mod error;
pub mod host;
pub mod models;
pub mod realtime;
pub mod service;
pub mod slack;
pub mod sync;

pub use actions::{OpenOutcome, open_team};
pub use badge::{
    BadgeColor, BadgeRenderer, BadgeView, HostSurface, HttpIconLoader, ICON_SIZE, IconBitmap,
    IconCache, IconLoader,
};
pub use config::Settings;
pub use counts::CountAggregator;
pub use credential::{CredentialStore, SettingsTokenSource, StaticTokenSource, TokenSource};
pub use error::{Error, Result};
pub use host::{HostRuntime, OpenView, TeamViews};
pub use models::{BadgeTotals, ConversationId, TeamIcon, TeamInfo};
pub use realtime::{
    ConnectionState, DesktopNotification, ReconnectPolicy, RtmEvent, StreamConnector, StreamEvent,
    StreamManager, WebSocketConnector,
};
pub use service::NotifierService;
pub use slack::{SlackApi, SlackClient};
pub use sync::{RefreshSchedule, cooldown_elapsed};
