//! Desktop host for the notifier
//!
//! Writes the badge icon to a PNG in the config directory, logs badge and
//! notification updates, and opens team views in the default browser.

use anyhow::{Context, Result};
use image::RgbaImage;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Mutex;

use unread::{
    BadgeColor, DesktopNotification, HostRuntime, HostSurface, IconBitmap, OpenView, TeamViews,
};

/// Filename of the rendered icon in the config directory
pub const ICON_FILE: &str = "badge-icon.png";

pub struct DesktopHost {
    icon_path: Option<PathBuf>,
    views: Mutex<Vec<OpenView>>,
}

impl DesktopHost {
    pub fn new() -> Self {
        Self::with_icon_path(config::config_path(ICON_FILE))
    }

    pub fn with_icon_path(icon_path: Option<PathBuf>) -> Self {
        Self {
            icon_path,
            views: Mutex::new(Vec::new()),
        }
    }

    fn write_icon(&self, icon: &IconBitmap) -> Result<()> {
        let Some(path) = &self.icon_path else {
            return Ok(());
        };
        let image = RgbaImage::from_raw(icon.width, icon.height, icon.rgba.clone())
            .context("Icon buffer does not match its dimensions")?;
        image
            .save(path)
            .with_context(|| format!("Failed to write icon to {}", path.display()))?;
        debug!("Wrote badge icon to {}", path.display());
        Ok(())
    }
}

impl Default for DesktopHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSurface for DesktopHost {
    fn set_icon(&self, icon: &IconBitmap) {
        if let Err(e) = self.write_icon(icon) {
            warn!("{:#}", e);
        }
    }

    fn set_badge_text(&self, text: &str) {
        if text.is_empty() {
            info!("Badge cleared");
        } else {
            info!("Badge: {}", text);
        }
    }

    fn set_badge_color(&self, color: BadgeColor) {
        info!("Badge color: {}", color.to_hex());
    }
}

impl HostRuntime for DesktopHost {
    fn keep_alive(&self) {
        debug!("Realtime stream alive");
    }

    fn notify(&self, notification: &DesktopNotification, team_icon_url: Option<&str>) {
        info!(
            "Notification: {}: {} (icon: {})",
            notification.title,
            notification.content,
            team_icon_url.unwrap_or("none")
        );
    }
}

impl TeamViews for DesktopHost {
    fn list_views(&self) -> Vec<OpenView> {
        self.views.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn focus_view(&self, id: u64) -> Result<()> {
        let url = self
            .list_views()
            .into_iter()
            .find(|view| view.id == id)
            .map(|view| view.url)
            .with_context(|| format!("No view with id {}", id))?;
        // The browser reuses its tab for a URL it already has open
        open::that(&url).with_context(|| format!("Failed to open {}", url))
    }

    fn open_view(&self, url: &str) -> Result<()> {
        open::that(url).with_context(|| format!("Failed to open {}", url))?;
        if let Ok(mut views) = self.views.lock() {
            let id = views.len() as u64 + 1;
            views.push(OpenView {
                id,
                url: url.to_string(),
            });
        }
        Ok(())
    }
}
