//! Slack Web API integration
//!
//! This module provides:
//! - The authenticated form-POST client and the [`SlackApi`] seam
//! - Response types for the handful of methods the notifier calls

mod client;

pub use client::{SlackApi, SlackClient};

/// Web API method names
pub mod methods {
    pub const USERS_COUNTS: &str = "users.counts";
    pub const TEAM_INFO: &str = "team.info";
}

/// Slack API response types
pub mod api {
    use serde::Deserialize;

    use crate::models::TeamInfo;

    /// Response from `users.counts`
    #[derive(Debug, Default, Deserialize)]
    pub struct CountsResponse {
        #[serde(default)]
        pub channels: Vec<ChannelCounts>,
        #[serde(default)]
        pub groups: Vec<ChannelCounts>,
        #[serde(default)]
        pub mpims: Vec<ChannelCounts>,
        #[serde(default)]
        pub ims: Vec<ImCounts>,
    }

    /// Counts for a public channel, private group or multi-party DM
    #[derive(Debug, Clone, Deserialize)]
    pub struct ChannelCounts {
        pub id: String,
        #[serde(default)]
        pub unread_count_display: u32,
        #[serde(default)]
        pub mention_count_display: u32,
        #[serde(default)]
        pub is_muted: bool,
    }

    /// Counts for a direct message; every unread DM counts as a mention
    #[derive(Debug, Clone, Deserialize)]
    pub struct ImCounts {
        pub id: String,
        #[serde(default)]
        pub dm_count: u32,
    }

    /// Response from `team.info`
    #[derive(Debug, Deserialize)]
    pub struct TeamInfoResponse {
        pub team: TeamInfo,
    }

    /// Response from `rtm.connect` / `rtm.start`
    #[derive(Debug, Deserialize)]
    pub struct ConnectResponse {
        /// One-time WebSocket URL
        pub url: String,
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;

    #[test]
    fn test_parse_counts_with_missing_sections() {
        let json = r#"{
            "ok": true,
            "channels": [
                { "id": "C1", "unread_count_display": 2, "mention_count_display": 0, "is_muted": false }
            ]
        }"#;

        let counts: CountsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(counts.channels.len(), 1);
        assert_eq!(counts.channels[0].unread_count_display, 2);
        assert!(counts.groups.is_empty());
        assert!(counts.ims.is_empty());
    }

    #[test]
    fn test_parse_ims() {
        let json = r#"{ "ims": [ { "id": "D1", "dm_count": 4, "is_open": true } ] }"#;
        let counts: CountsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(counts.ims[0].id, "D1");
        assert_eq!(counts.ims[0].dm_count, 4);
    }
}
