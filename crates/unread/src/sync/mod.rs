//! Periodic snapshot scheduling
//!
//! The host timer ticks on a fixed interval; these helpers decide whether a
//! tick should actually hit `users.counts`.

mod timing;

pub use timing::{RefreshSchedule, cooldown_elapsed};
