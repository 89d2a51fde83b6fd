//! Error types used by the bus and by listeners.
//!
//! This module defines two main error enums:
//!
//! - [`BusError`]: errors raised while building or reconfiguring the bus.
//! - [`ListenerError`]: errors returned by listener callbacks.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Neither ever escapes `notify()`: listener failures are isolated by the dispatcher.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the bus itself.
///
/// Only construction and [`reload`](crate::EventBus::reload) can fail; the
/// delivery path is infallible from the caller's point of view.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Delay bounds are inconsistent (`max_delay` shorter than `min_delay`).
    #[error("invalid delays: min={min:?} exceeds max={max:?}")]
    InvalidDelays {
        /// Requested eligibility delay.
        min: Duration,
        /// Requested deferral ceiling.
        max: Duration,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cachebus::BusError;
    /// use std::time::Duration;
    ///
    /// let err = BusError::InvalidDelays { min: Duration::from_secs(5), max: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "bus_invalid_delays");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::InvalidDelays { .. } => "bus_invalid_delays",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::InvalidDelays { min, max } => {
                format!("min_delay {min:?} must not exceed max_delay {max:?}")
            }
        }
    }
}

/// # Errors returned by listener callbacks.
///
/// The dispatcher logs them together with the listener name and the event and
/// moves on to the next listener.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The listener tried to handle the event and failed.
    #[error("listener failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The listener refused the event (e.g. it is shutting down).
    #[error("listener rejected event: {reason}")]
    Rejected {
        /// Why the event was refused.
        reason: String,
    },
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`].
    pub fn failed(error: impl Into<String>) -> Self {
        ListenerError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cachebus::ListenerError;
    ///
    /// let err = ListenerError::failed("backend down");
    /// assert_eq!(err.as_label(), "listener_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Failed { .. } => "listener_failed",
            ListenerError::Rejected { .. } => "listener_rejected",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ListenerError::Failed { error } => format!("error: {error}"),
            ListenerError::Rejected { reason } => format!("rejected: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let bus = BusError::InvalidDelays {
            min: Duration::from_secs(3),
            max: Duration::from_secs(1),
        };
        assert_eq!(bus.as_label(), "bus_invalid_delays");
        assert!(bus.as_message().contains("3s"));

        let rejected = ListenerError::Rejected {
            reason: "closing".into(),
        };
        assert_eq!(rejected.as_label(), "listener_rejected");
        assert_eq!(rejected.as_message(), "rejected: closing");
        assert_eq!(
            ListenerError::failed("boom").to_string(),
            "listener failed: boom"
        );
    }
}
