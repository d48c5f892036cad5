//! Open-team action
//!
//! Brings the team's web client to the front, reusing an open view when
//! there is one.

use anyhow::{Context, Result};
use log::info;

use crate::host::TeamViews;
use crate::service::NotifierService;

/// What `open_team` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// An existing view was focused
    Focused { id: u64 },
    /// A new view was opened on the team URL
    Opened { url: String },
}

/// First view whose URL starts with `prefix`
pub fn find_view(views: &dyn TeamViews, prefix: &str) -> Option<u64> {
    views
        .list_views()
        .into_iter()
        .find(|view| view.url.starts_with(prefix))
        .map(|view| view.id)
}

/// Focus or open the team's web client
pub async fn open_team(service: &NotifierService, views: &dyn TeamViews) -> Result<OpenOutcome> {
    let team = service
        .team_info()
        .await
        .context("Failed to look up team for open action")?;
    let url = team.web_url();

    if let Some(id) = find_view(views, &url) {
        views.focus_view(id)?;
        info!("Focused existing view {} for {}", id, url);
        return Ok(OpenOutcome::Focused { id });
    }

    views.open_view(&url)?;
    info!("Opened {}", url);
    Ok(OpenOutcome::Opened { url })
}
