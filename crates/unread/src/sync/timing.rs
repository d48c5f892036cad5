//! Refresh timing utilities
//!
//! Pure functions that can be tested without a runtime.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Check if enough time has elapsed since the last snapshot to take another.
///
/// # Arguments
/// * `last_snapshot_at` - When the last snapshot was applied (None if never)
/// * `cooldown_secs` - Minimum seconds between snapshots
pub fn cooldown_elapsed(last_snapshot_at: Option<DateTime<Utc>>, cooldown_secs: u64) -> bool {
    match last_snapshot_at {
        Some(last) => {
            let elapsed = Utc::now() - last;
            elapsed.num_seconds() >= cooldown_secs as i64
        }
        None => true,
    }
}

/// Timer period and cooldown for snapshot refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub interval: Duration,
    pub cooldown: Duration,
}

impl RefreshSchedule {
    /// Tick every `interval_secs`; skip a tick if a snapshot landed within
    /// half an interval (e.g. right after a token change).
    pub fn every(interval_secs: u64) -> Self {
        let interval_secs = interval_secs.max(1);
        Self {
            interval: Duration::from_secs(interval_secs),
            cooldown: Duration::from_secs(interval_secs / 2),
        }
    }

    /// Whether a tick should refresh given the last snapshot time
    pub fn is_due(&self, last_snapshot_at: Option<DateTime<Utc>>) -> bool {
        cooldown_elapsed(last_snapshot_at, self.cooldown.as_secs())
    }
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self::every(60)
    }
}
