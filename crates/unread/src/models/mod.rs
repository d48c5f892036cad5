//! Domain models for counts and team metadata

mod conversation;
mod team;
mod totals;

pub use conversation::ConversationId;
pub use team::{TeamIcon, TeamInfo};
pub use totals::BadgeTotals;
