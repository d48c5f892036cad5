//! Badge rendering
//!
//! Turns [`BadgeTotals`](crate::models::BadgeTotals) into a toolbar icon
//! (full color, or gray when there is nothing to read) plus a numeric badge.

mod icon;
mod renderer;

pub use icon::{HttpIconLoader, ICON_SIZE, IconBitmap, IconCache, IconLoader};
pub use renderer::{BadgeColor, BadgeRenderer, BadgeView, HostSurface};
