//! # Core listener trait
//!
//! `Listener` is the extension point for reacting to cache changes. Listeners
//! are registered globally or per region in a
//! [`ListenerRegistry`](crate::ListenerRegistry) and invoked by the dispatcher.
//!
//! ## Contract
//! - Implementations may be slow (I/O, reloads); they run on the executor and
//!   do **not** block `notify()` nor the queue consumer.
//! - A returned error or a panic is caught, logged with [`Listener::name`] and
//!   the event, and does not stop delivery to the other listeners.
//! - Identity is the allocation: the same `Arc` registered twice is one listener.
//!
//! ## Example (skeleton)
//! ```rust
//! use async_trait::async_trait;
//! use cachebus::{CacheEvent, Listener, ListenerError, ListenerRef};
//!
//! struct NearCache;
//!
//! #[async_trait]
//! impl Listener for NearCache {
//!     async fn on_event(
//!         &self,
//!         _sender: Option<&ListenerRef>,
//!         event: &CacheEvent,
//!         _from_remote: bool,
//!     ) -> Result<(), ListenerError> {
//!         for _key in event.keys() {
//!             // drop local copy...
//!         }
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str { "near-cache" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ListenerError;
use crate::events::CacheEvent;

/// Shared handle to a listener.
pub type ListenerRef = Arc<dyn Listener>;

/// Contract for cache-change listeners.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handle one cache change.
    ///
    /// # Parameters
    /// - `sender`: the originator of the change, if it is itself a listener
    /// - `event`: the change (does not transfer ownership)
    /// - `from_remote`: true if the change was received from a peer node
    async fn on_event(
        &self,
        sender: Option<&ListenerRef>,
        event: &CacheEvent,
        from_remote: bool,
    ) -> Result<(), ListenerError>;

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// True if both handles point at the same listener instance.
#[inline]
pub fn same_listener(a: &ListenerRef, b: &ListenerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
