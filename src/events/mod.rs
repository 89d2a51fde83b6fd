//! Cache events: data model and coalescing identity.
//!
//! ## Contents
//! - [`CacheEvent`] region/keys/kind payload with builder setters
//! - [`ChangeKind`] classification of the change
//! - [`Condition`] optional relevance predicate, evaluated by listeners only
//! - [`EventIdentity`] the key that decides whether two local events coalesce
//!
//! ## Quick reference
//! - **Producers**: cache layers calling [`EventBus::notify`](crate::EventBus::notify).
//! - **Consumers**: [`Listener`](crate::Listener)s, via the dispatcher.

mod event;

pub use event::{CacheEvent, ChangeKind, Condition, EventIdentity};
