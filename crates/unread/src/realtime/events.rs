//! Inbound realtime event decoding
//!
//! Frames are classified into a closed set of known kinds plus
//! [`RtmEvent::Unknown`]. A frame that is not JSON, or that names a known
//! kind but lacks its fields, is malformed and decodes to `None`.

use log::trace;
use serde::Deserialize;

use crate::models::ConversationId;

/// A decoded realtime message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RtmEvent {
    ChannelMarked(ConversationMarked),
    GroupMarked(ConversationMarked),
    ImMarked(DirectMessageMarked),
    PresenceChange,
    ReconnectUrl,
    DesktopNotification(DesktopNotification),
    /// Any other kind, or a frame without a `type` (e.g. reply acks)
    #[serde(skip)]
    Unknown { kind: Option<String> },
}

/// Kinds that have a variant above
const KNOWN_KINDS: &[&str] = &[
    "channel_marked",
    "group_marked",
    "im_marked",
    "presence_change",
    "reconnect_url",
    "desktop_notification",
];

/// Read position changed in a channel or group
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationMarked {
    pub channel: ConversationId,
    pub unread_count_display: u32,
    pub mention_count_display: u32,
}

/// Read position changed in a direct message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DirectMessageMarked {
    pub channel: ConversationId,
    pub dm_count: u32,
}

/// A notification the service wants shown on the desktop
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DesktopNotification {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "avatarImage")]
    pub avatar_image: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub channel: Option<ConversationId>,
}

impl RtmEvent {
    /// Decode one text frame. Returns `None` for malformed frames.
    pub fn decode(text: &str) -> Option<Self> {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                trace!(target: "Realtime/Decode", "Discarding non-JSON frame: {e}");
                return None;
            }
        };

        let kind = value.get("type").and_then(|t| t.as_str()).map(str::to_string);
        let known = kind.as_deref().is_some_and(|k| KNOWN_KINDS.contains(&k));
        if !known {
            return Some(RtmEvent::Unknown { kind });
        }

        match serde_json::from_value(value) {
            Ok(event) => Some(event),
            Err(e) => {
                trace!(target: "Realtime/Decode", "Discarding malformed {:?} frame: {e}", kind);
                None
            }
        }
    }

    /// Wire name of this event's kind
    pub fn kind(&self) -> &str {
        match self {
            RtmEvent::ChannelMarked(_) => "channel_marked",
            RtmEvent::GroupMarked(_) => "group_marked",
            RtmEvent::ImMarked(_) => "im_marked",
            RtmEvent::PresenceChange => "presence_change",
            RtmEvent::ReconnectUrl => "reconnect_url",
            RtmEvent::DesktopNotification(_) => "desktop_notification",
            RtmEvent::Unknown { kind } => kind.as_deref().unwrap_or("<untyped>"),
        }
    }

    /// Whether this event can change counts
    pub fn affects_counts(&self) -> bool {
        matches!(
            self,
            RtmEvent::ChannelMarked(_) | RtmEvent::GroupMarked(_) | RtmEvent::ImMarked(_)
        )
    }
}
