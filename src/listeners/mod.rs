//! # Cache-change listeners and their registry.
//!
//! This module provides the [`Listener`] trait and the [`ListenerRegistry`]
//! that maps regions to interested listeners.
//!
//! ## Architecture
//! ```text
//! notify(sender, event) ──► ListenerRegistry::resolve(event.region, sender)
//!                                  │
//!                  ┌───────────────┴───────────────┐
//!                  ▼                               ▼
//!          regions[event.region]                global
//!                  └───────────────┬───────────────┘
//!                                  ▼
//!                    snapshot (minus sender) ──► Notification
//! ```
//!
//! ## Listener kinds
//! - **Region listeners** receive only events whose region equals theirs.
//! - **Global listeners** receive every event, including region-less ones.

mod listener;
#[cfg(feature = "logging")]
mod log;
mod registry;

pub use listener::{Listener, ListenerRef, same_listener};
#[cfg(feature = "logging")]
pub use log::LogListener;
pub use registry::ListenerRegistry;
