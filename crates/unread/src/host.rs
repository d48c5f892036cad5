//! Seams to the host runtime
//!
//! The icon/badge surface lives next to the renderer
//! ([`HostSurface`](crate::badge::HostSurface)); everything else the core needs
//! from its host is declared here.

use crate::realtime::DesktopNotification;

/// Process-level services of the host
pub trait HostRuntime: Send + Sync {
    /// Periodic liveness signal while the realtime stream is connected
    fn keep_alive(&self);

    /// Show a desktop notification pushed by the service
    ///
    /// `team_icon_url` is the icon the badge was rendered from, if loaded.
    fn notify(&self, notification: &DesktopNotification, team_icon_url: Option<&str>);
}

/// An open view (tab, window) in the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenView {
    pub id: u64,
    pub url: String,
}

/// The host's views, used by the open-team action
pub trait TeamViews: Send + Sync {
    /// Views currently open, in the host's order
    fn list_views(&self) -> Vec<OpenView>;

    /// Bring an existing view to the front
    fn focus_view(&self, id: u64) -> anyhow::Result<()>;

    /// Open a new view on `url`
    fn open_view(&self, url: &str) -> anyhow::Result<()>;
}
