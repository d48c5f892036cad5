//! Team metadata returned by `team.info`

use serde::{Deserialize, Serialize};

/// The workspace the token belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Subdomain, e.g. "acme" for acme.slack.com
    pub domain: String,
    #[serde(default)]
    pub icon: TeamIcon,
}

/// Team icon URLs at the sizes the API offers
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamIcon {
    pub image_34: Option<String>,
    pub image_44: Option<String>,
    pub image_68: Option<String>,
    pub image_88: Option<String>,
    pub image_102: Option<String>,
    pub image_132: Option<String>,
    pub image_230: Option<String>,
    /// True when the team never uploaded an icon
    #[serde(default)]
    pub image_default: bool,
}

impl TeamInfo {
    /// Web client URL for this team, always with a trailing slash
    pub fn web_url(&self) -> String {
        format!("https://{}.slack.com/", self.domain)
    }
}

impl TeamIcon {
    /// URL to load the toolbar icon from.
    ///
    /// Prefers the 132px rendition, then falls back to the closest size.
    pub fn best_url(&self) -> Option<&str> {
        [
            &self.image_132,
            &self.image_102,
            &self.image_230,
            &self.image_88,
            &self.image_68,
            &self.image_44,
            &self.image_34,
        ]
        .into_iter()
        .find_map(|url| url.as_deref().filter(|u| !u.is_empty()))
    }
}
