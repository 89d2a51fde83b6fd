use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::BusMetrics;

/// Snapshot of the counters for one region (`None` = region-less events).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionCounts {
    /// Local events that created a new queue entry.
    pub offered: u64,
    /// Queued entries dispatched to their listeners.
    pub delivered: u64,
}

#[derive(Default)]
struct Counters {
    offered: AtomicU64,
    delivered: AtomicU64,
}

/// In-memory [`BusMetrics`] with totals and per-region breakdown.
#[derive(Default)]
pub struct CounterMetrics {
    total: Counters,
    regions: DashMap<Option<Arc<str>>, Counters>,
}

impl CounterMetrics {
    /// Creates a sink with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries created across all regions.
    pub fn offered(&self) -> u64 {
        self.total.offered.load(Ordering::Relaxed)
    }

    /// Entries dispatched across all regions.
    pub fn delivered(&self) -> u64 {
        self.total.delivered.load(Ordering::Relaxed)
    }

    /// Counters for one region; all zero if it never reported.
    pub fn region(&self, region: Option<&str>) -> RegionCounts {
        let key = region.map(Arc::<str>::from);
        self.regions
            .get(&key)
            .map(|c| RegionCounts {
                offered: c.offered.load(Ordering::Relaxed),
                delivered: c.delivered.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    fn bump(&self, region: Option<&str>, pick: impl Fn(&Counters) -> &AtomicU64) {
        pick(&self.total).fetch_add(1, Ordering::Relaxed);
        let entry = self.regions.entry(region.map(Arc::from)).or_default();
        pick(entry.value()).fetch_add(1, Ordering::Relaxed);
    }
}

impl BusMetrics for CounterMetrics {
    fn increment_offered_events(&self, region: Option<&str>) {
        self.bump(region, |c| &c.offered);
    }

    fn increment_delivered_events(&self, region: Option<&str>) {
        self.bump(region, |c| &c.delivered);
    }
}
