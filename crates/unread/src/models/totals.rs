//! Aggregate badge state

/// Sum of all unread and mention counts
///
/// Always derived from the aggregator's maps, never stored on its own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BadgeTotals {
    pub unread: u64,
    pub mentions: u64,
}

impl BadgeTotals {
    pub fn new(unread: u64, mentions: u64) -> Self {
        Self { unread, mentions }
    }

    /// Nothing to show: the icon goes gray and the badge is cleared
    pub fn is_idle(&self) -> bool {
        self.unread == 0 && self.mentions == 0
    }
}
