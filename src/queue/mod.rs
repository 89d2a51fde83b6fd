//! Coalescing delay queue.
//!
//! ## Contents
//! - [`DelayQueue`] identity-coalescing priority queue keyed by eligibility time
//! - [`Delays`] validated `min`/`max` delay pair
//! - [`QueueEntry`], [`Delayed`] what `take`/`drain_to` hand out
//! - [`Offer`] insert-or-merge outcome
//!
//! The queue is generic over its identity key and payload; the bus uses
//! [`EventIdentity`](crate::EventIdentity) and [`Notification`](crate::Notification).

mod delay;

pub use delay::{DelayQueue, Delayed, Delays, Offer, QueueEntry};
