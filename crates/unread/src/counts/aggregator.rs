//! Per-conversation unread and mention bookkeeping

use log::{debug, info};
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::models::{BadgeTotals, ConversationId};
use crate::realtime::RtmEvent;
use crate::slack::api::{ChannelCounts, CountsResponse};
use crate::slack::{SlackApi, methods};

/// Unread and mention counts keyed by conversation
///
/// Snapshots replace everything; events patch single entries. Totals are
/// always recomputed from the maps so missed or duplicated events can't make
/// them drift.
#[derive(Debug, Default, Clone)]
pub struct CountAggregator {
    unread: HashMap<ConversationId, u32>,
    mentions: HashMap<ConversationId, u32>,
    /// Muted channels/groups from the last snapshot
    muted: HashSet<ConversationId>,
}

impl CountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch `users.counts` and replace both maps with it
    pub fn refresh_snapshot(&mut self, api: &dyn SlackApi, token: &str) -> Result<()> {
        let json = api.call(token, methods::USERS_COUNTS, &[])?;
        let snapshot: CountsResponse = serde_json::from_value(json)
            .map_err(|e| Error::transport(methods::USERS_COUNTS, e))?;
        self.replace_snapshot(&snapshot);
        Ok(())
    }

    /// Replace all state with a full counts snapshot
    pub fn replace_snapshot(&mut self, snapshot: &CountsResponse) {
        self.clear();

        let conversations = snapshot
            .channels
            .iter()
            .chain(&snapshot.groups)
            .chain(&snapshot.mpims);
        for counts in conversations {
            self.record_conversation(counts);
        }

        // Any unread DM is something addressed to the user
        for im in &snapshot.ims {
            self.mentions.insert(ConversationId::new(&im.id), im.dm_count);
        }

        debug!(
            "Applied counts snapshot: {} unread entries, {} mention entries, {} muted",
            self.unread.len(),
            self.mentions.len(),
            self.muted.len()
        );
    }

    fn record_conversation(&mut self, counts: &ChannelCounts) {
        let id = ConversationId::new(&counts.id);
        if counts.is_muted {
            self.muted.insert(id.clone());
        } else {
            self.unread.insert(id.clone(), counts.unread_count_display);
        }
        self.mentions.insert(id, counts.mention_count_display);
    }

    /// Apply one realtime event.
    ///
    /// Returns `true` if the event touched the counts. Kinds that carry no
    /// counts are ignored.
    pub fn apply_event(&mut self, event: &RtmEvent) -> bool {
        match event {
            RtmEvent::ChannelMarked(marked) | RtmEvent::GroupMarked(marked) => {
                if !self.muted.contains(&marked.channel) {
                    self.unread
                        .insert(marked.channel.clone(), marked.unread_count_display);
                }
                self.mentions
                    .insert(marked.channel.clone(), marked.mention_count_display);
                true
            }
            RtmEvent::ImMarked(marked) => {
                self.mentions.insert(marked.channel.clone(), marked.dm_count);
                true
            }
            RtmEvent::Unknown { .. } => {
                info!("Ignoring unrecognized event kind {}", event.kind());
                false
            }
            _ => false,
        }
    }

    /// Sum both maps
    pub fn totals(&self) -> BadgeTotals {
        BadgeTotals {
            unread: self.unread.values().map(|&c| u64::from(c)).sum(),
            mentions: self.mentions.values().map(|&c| u64::from(c)).sum(),
        }
    }

    /// Unread count for one conversation, if tracked
    pub fn unread(&self, id: &ConversationId) -> Option<u32> {
        self.unread.get(id).copied()
    }

    /// Mention count for one conversation, if tracked
    pub fn mentions(&self, id: &ConversationId) -> Option<u32> {
        self.mentions.get(id).copied()
    }

    /// Whether the last snapshot reported this conversation as muted
    pub fn is_muted(&self, id: &ConversationId) -> bool {
        self.muted.contains(id)
    }

    /// Number of conversations in the unread map
    pub fn unread_len(&self) -> usize {
        self.unread.len()
    }

    /// Number of conversations in the mention map
    pub fn mentions_len(&self) -> usize {
        self.mentions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unread.is_empty() && self.mentions.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.unread.clear();
        self.mentions.clear();
        self.muted.clear();
    }
}
