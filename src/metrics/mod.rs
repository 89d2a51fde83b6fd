//! Delivery metrics.
//!
//! The bus reports two counters through [`BusMetrics`]:
//! - **offered**: a local event created a new queue entry (merges are not counted);
//! - **delivered**: a queued entry was drained and dispatched (once per entry,
//!   whatever its listeners returned).
//!
//! Remote events bypass the queue and are counted by neither. `offered / delivered`
//! over a window therefore measures how much coalescing saved.
//!
//! [`CounterMetrics`] is an in-memory implementation with per-region counters.

mod counter;

pub use counter::{CounterMetrics, RegionCounts};

/// Collaborator receiving the bus counters. Called from arbitrary tasks.
pub trait BusMetrics: Send + Sync + 'static {
    /// A local event was queued as a new entry.
    fn increment_offered_events(&self, region: Option<&str>);

    /// A queued entry was dispatched.
    fn increment_delivered_events(&self, region: Option<&str>);
}
