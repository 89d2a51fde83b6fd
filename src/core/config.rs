//! # Bus configuration.
//!
//! Provides [`BusConfig`] centralized settings for an [`EventBus`](crate::EventBus).
//!
//! Config is used in two ways:
//! 1. **Bus creation**: `EventBus::builder(config)`
//! 2. **Hot reload**: `EventBus::reload(config)` swaps it atomically; readers
//!    never block and always see a whole config.
//!
//! ## Constraints
//! - `min_delay ≤ max_delay` (checked by [`BusConfig::validate`])
//! - `min_delay = max_delay` disables coalescing beyond the first occurrence:
//!   every entry is delivered exactly `min_delay` after it was created.

use std::time::Duration;

use crate::error::BusError;
use crate::events::ChangeKind;
use crate::queue::Delays;

/// Settings of the coalescing bus.
///
/// ## Field semantics
/// - `min_delay`: delay applied to a fresh local event and re-applied on every merge
/// - `max_delay`: cap on how long a local event may be deferred from its first occurrence
/// - `forced_kinds`: change kinds whose merges may push an overdue entry past its deadline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Eligibility delay for local events.
    pub min_delay: Duration,

    /// Deferral ceiling for local events.
    ///
    /// Under a sustained burst of matching events, one delivery happens at
    /// most `max_delay` after the first of them.
    pub max_delay: Duration,

    /// Change kinds merged with the forced reset.
    ///
    /// For these kinds a matching entry that is already past its deadline but
    /// not yet drained gets a new deadline instead of staying due.
    pub forced_kinds: Vec<ChangeKind>,
}

impl BusConfig {
    /// Returns the validated delay pair.
    pub fn delays(&self) -> Result<Delays, BusError> {
        Delays::new(self.min_delay, self.max_delay)
    }

    /// Checks field constraints.
    pub fn validate(&self) -> Result<(), BusError> {
        self.delays().map(|_| ())
    }

    /// True if merges of `kind` use the forced reset.
    #[inline]
    pub fn forces(&self, kind: ChangeKind) -> bool {
        self.forced_kinds.contains(&kind)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `min_delay = 2s`
    /// - `max_delay = 10s`
    /// - `forced_kinds = []`
    fn default() -> Self {
        let delays = Delays::default();
        Self {
            min_delay: delays.min(),
            max_delay: delays.max(),
            forced_kinds: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = BusConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.min_delay, Duration::from_secs(2));
        assert_eq!(cfg.max_delay, Duration::from_secs(10));
        assert!(!cfg.forces(ChangeKind::Clear));
    }

    #[test]
    fn min_above_max_is_rejected() {
        let cfg = BusConfig {
            min_delay: Duration::from_secs(11),
            ..BusConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BusError::InvalidDelays { .. })
        ));
    }

    #[test]
    fn forced_kinds_are_looked_up() {
        let cfg = BusConfig {
            forced_kinds: vec![ChangeKind::Clear],
            ..BusConfig::default()
        };
        assert!(cfg.forces(ChangeKind::Clear));
        assert!(!cfg.forces(ChangeKind::Invalidate));
    }
}
