//! User-triggered actions

mod handler;

pub use handler::{OpenOutcome, find_view, open_team};
