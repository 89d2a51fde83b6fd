//! # cachebus
//!
//! **cachebus** is an in-process event bus for cache-invalidation traffic.
//!
//! Cache layers announce changes (puts, updates, invalidations, removals,
//! clears) to the bus; listeners such as cluster replicators, secondary cache
//! tiers or statistics collectors receive them. Bursts of matching local
//! changes are coalesced through a delay queue so listeners see one delivery
//! per burst, bounded in latency. Changes that arrived from peer nodes bypass
//! the queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   cache layer A       cache layer B         peer node
//!        │                    │                   │
//!        │ notify(local)      │ notify(local)     │ notify(remote)
//!        ▼                    ▼                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventBus                                                         │
//! │  - ListenerRegistry (global list + per-region lists, copy-on-write)│
//! │  - BusConfig (ArcSwap, hot reload)                                │
//! │  - DelayQueue<EventIdentity, Notification> (coalescing)           │
//! │  - Dispatcher (executor or inline)                                │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        │ local: offer_or_merge                        │ remote: now
//!        ▼                                              │
//! ┌──────────────────────────┐                          │
//! │  DelayQueue              │                          │
//! │  ordered by stamp        │                          │
//! │  stamp ≤ max_stamp       │                          │
//! └──────┬───────────────────┘                          │
//!        │ take() + drain_to()                          │
//!        ▼                                              │
//! ┌──────────────────────────┐                          │
//! │  QueueWorker             │                          │
//! └──────┬───────────────────┘                          │
//!        ▼                                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                Executor (TokioExecutor / inline)                  │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         listener1.on_event()
//!                         listener2.on_event()   (in order, failures isolated)
//!                         listenerN.on_event()
//! ```
//!
//! ### Entry lifecycle
//! ```text
//! notify(local, e) at t0
//!   ├─► no pending entry with e.identity()
//!   │       └─ insert: stamp = t0 + min_delay, max_stamp = t0 + max_delay
//!   └─► pending entry found
//!           └─ merge: stamp = min(now + min_delay, max_stamp)
//!
//! worker:
//!   take() at stamp ─► drain every other due entry ─► dispatch batch
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Bus**           | Register listeners, announce changes, reload, shut down.     | [`EventBus`], [`EventBusBuilder`]           |
//! | **Listeners**     | Receive changes; global or region-scoped.                    | [`Listener`], [`ListenerRegistry`]          |
//! | **Events**        | Change description and its coalescing identity.              | [`CacheEvent`], [`ChangeKind`], [`Condition`] |
//! | **Queue**         | Generic coalescing delay queue.                              | [`DelayQueue`], [`Delays`]                  |
//! | **Execution**     | Where listener work runs.                                    | [`Executor`], [`TokioExecutor`]             |
//! | **Metrics**       | Offered/delivered counters.                                  | [`BusMetrics`], [`CounterMetrics`]          |
//! | **Errors**        | Typed configuration and listener errors.                     | [`BusError`], [`ListenerError`]             |
//! | **Configuration** | Delays and forced-merge kinds.                               | [`BusConfig`]                               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogListener`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use cachebus::{BusConfig, CacheEvent, EventBus, Listener, ListenerError, ListenerRef};
//!
//! struct Replicator;
//!
//! #[async_trait]
//! impl Listener for Replicator {
//!     async fn on_event(
//!         &self,
//!         _sender: Option<&ListenerRef>,
//!         event: &CacheEvent,
//!         _from_remote: bool,
//!     ) -> Result<(), ListenerError> {
//!         println!("replicating {event:?}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = BusConfig {
//!         min_delay: Duration::from_millis(100),
//!         max_delay: Duration::from_secs(1),
//!         ..BusConfig::default()
//!     };
//!     let bus = EventBus::builder(cfg).build()?;
//!     bus.add_region_listener("users", Arc::new(Replicator));
//!
//!     // Three invalidations of the same key: one delivery, ~100ms later.
//!     for _ in 0..3 {
//!         bus.notify(None, CacheEvent::invalidate("users", "42"), false).await;
//!     }
//!     tokio::time::sleep(Duration::from_millis(300)).await;
//!
//!     // Shutdown drops whatever is still pending.
//!     bus.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod exec;
mod listeners;
mod metrics;
mod queue;

// ---- Public re-exports ----

pub use core::{BusConfig, EventBus, EventBusBuilder, Notification, WorkerExit, WorkerStatus};
pub use error::{BusError, ListenerError};
pub use events::{CacheEvent, ChangeKind, Condition, EventIdentity};
pub use exec::{Executor, Job, Rejected, TokioExecutor};
pub use listeners::{Listener, ListenerRef, ListenerRegistry, same_listener};
pub use metrics::{BusMetrics, CounterMetrics, RegionCounts};
pub use queue::{DelayQueue, Delayed, Delays, Offer, QueueEntry};

// Optional: expose a simple built-in logger listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogListener;
