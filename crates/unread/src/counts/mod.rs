//! Count aggregation
//!
//! Reconciles `users.counts` snapshots with realtime `*_marked` events.

mod aggregator;

pub use aggregator::CountAggregator;
