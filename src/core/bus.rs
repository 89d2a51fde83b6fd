//! # EventBus: listener registries, coalescing queue and dispatch.
//!
//! The [`EventBus`] owns the listener registry, the delay queue and the queue
//! worker. It is created by [`EventBusBuilder`](crate::EventBusBuilder) and
//! shared as `Arc<EventBus>`.
//!
//! ## Event flow
//! ```text
//! notify(sender, event, from_remote)
//!   ├─ bus shut down             ─► drop (debug)
//!   ├─ resolve listeners          region ∪ global − sender
//!   │    └─ empty                 ─► nothing queued, nothing counted
//!   ├─ from_remote = true         ─► Dispatcher::submit now (not counted)
//!   └─ from_remote = false        ─► queue.offer_or_merge(identity)
//!                                       ├─ Inserted ─► metrics.offered += 1
//!                                       └─ Merged   ─► stamp pushed, no count
//!
//! QueueWorker (spawned by the builder)
//!   take() ─► drain_to() ─► Dispatcher::submit per entry ─► metrics.delivered += 1
//! ```
//!
//! ## Rules
//! - A listener never receives an event it sent.
//! - Remote events are never coalesced or delayed.
//! - Events whose identity matches a pending entry merge into it; the listener
//!   snapshot taken for the first of them is the one delivered to.
//! - Once [`shutdown`](EventBus::shutdown) ran (or the bus was dropped) every
//!   later event is dropped, remote ones included.
//! - On a degraded bus (worker gone) local events are dropped with a warning;
//!   remote events are still dispatched.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::builder::EventBusBuilder;
use super::config::BusConfig;
use super::dispatch::{Dispatcher, Notification, NotificationTask, Submit};
use super::worker::{NotificationQueue, WorkerStatus};
use crate::error::BusError;
use crate::events::CacheEvent;
use crate::exec::Executor;
use crate::listeners::{ListenerRef, ListenerRegistry};
use crate::queue::Offer;

/// Coalescing cache-invalidation event bus.
///
/// See the [module docs](self) for the event flow.
pub struct EventBus {
    config: ArcSwap<BusConfig>,
    registry: Arc<ListenerRegistry>,
    queue: Arc<NotificationQueue>,
    dispatcher: Arc<Dispatcher>,
    worker: Mutex<Option<JoinHandle<()>>>,
    status: Arc<Mutex<WorkerStatus>>,
}

impl EventBus {
    /// Starts building a bus with `cfg`.
    pub fn builder(cfg: BusConfig) -> EventBusBuilder {
        EventBusBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        config: BusConfig,
        registry: Arc<ListenerRegistry>,
        queue: Arc<NotificationQueue>,
        dispatcher: Arc<Dispatcher>,
        worker: JoinHandle<()>,
        status: Arc<Mutex<WorkerStatus>>,
    ) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            registry,
            queue,
            dispatcher,
            worker: Mutex::new(Some(worker)),
            status,
        }
    }

    /// Registers a listener for every event. Returns `false` if already registered.
    pub fn add_listener(&self, listener: ListenerRef) -> bool {
        self.registry.add(listener)
    }

    /// Unregisters a global listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &ListenerRef) -> bool {
        self.registry.remove(listener)
    }

    /// Registers a listener for events of `region` only.
    pub fn add_region_listener(&self, region: &str, listener: ListenerRef) -> bool {
        self.registry.add_to_region(region, listener)
    }

    /// Unregisters a region listener.
    pub fn remove_region_listener(&self, region: &str, listener: &ListenerRef) -> bool {
        self.registry.remove_from_region(region, listener)
    }

    /// The listener registry backing this bus.
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Announces a cache change.
    ///
    /// Local events (`from_remote = false`) are queued and coalesced; this
    /// never waits for listeners. Remote events are dispatched right away and
    /// the call only waits when the executor refuses the job and it runs inline.
    pub async fn notify(&self, sender: Option<&ListenerRef>, event: CacheEvent, from_remote: bool) {
        if !self.queue.is_running() {
            tracing::debug!(seq = event.seq(), remote = from_remote, "bus shut down; event dropped");
            return;
        }

        let listeners = self.registry.resolve(event.region(), sender);
        if listeners.is_empty() {
            tracing::trace!(seq = event.seq(), "no listener for event");
            return;
        }

        let event = Arc::new(event);
        let notification = Notification::new(
            Arc::clone(&event),
            listeners,
            sender.cloned(),
            from_remote,
        );

        if from_remote {
            let task = NotificationTask::immediate(notification);
            if self.dispatcher.submit(task).await == Submit::Closed {
                tracing::warn!(seq = event.seq(), "executor closed; remote event dispatched inline");
            }
            return;
        }

        if self.is_degraded() {
            tracing::warn!(
                seq = event.seq(),
                "queue worker is not running; local event dropped"
            );
            return;
        }

        let identity = event.identity();
        let offer = if self.config.load().forces(event.kind()) {
            self.queue.offer_or_force_merge(identity, move || notification)
        } else {
            self.queue.offer_or_merge(identity, move || notification)
        };

        match offer {
            Offer::Inserted => {
                if let Some(metrics) = self.dispatcher.metrics() {
                    metrics.increment_offered_events(event.region());
                }
            }
            Offer::Merged => {
                tracing::trace!(seq = event.seq(), kind = event.kind().as_label(), "event coalesced");
            }
        }
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<BusConfig> {
        self.config.load_full()
    }

    /// Validates and applies a new configuration.
    ///
    /// New delays apply to entries created or merged afterwards; pending
    /// stamps are not recomputed.
    pub fn reload(&self, cfg: BusConfig) -> Result<(), BusError> {
        let delays = cfg.delays()?;
        self.queue.set_delays(delays);
        tracing::info!(
            min_delay = ?cfg.min_delay,
            max_delay = ?cfg.max_delay,
            forced = cfg.forced_kinds.len(),
            "bus configuration reloaded"
        );
        self.config.store(Arc::new(cfg));
        Ok(())
    }

    /// Replaces the executor used for dispatch; `None` dispatches inline.
    pub fn set_executor(&self, executor: Option<Arc<dyn Executor>>) {
        self.dispatcher.set_executor(executor);
    }

    /// Number of local entries waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Lifecycle state of the queue worker.
    pub fn worker_status(&self) -> WorkerStatus {
        *self.status.lock()
    }

    /// True if the worker stopped for any reason other than shutdown.
    pub fn is_degraded(&self) -> bool {
        matches!(self.worker_status(), WorkerStatus::Exited(exit) if !exit.is_clean())
    }

    /// False once [`shutdown`](Self::shutdown) was called.
    pub fn is_running(&self) -> bool {
        self.queue.is_running()
    }

    /// Stops the bus and waits for the worker to exit. Idempotent.
    ///
    /// Entries still pending are dropped; a batch already being dispatched
    /// completes first.
    pub async fn shutdown(&self) {
        if self.queue.is_running() {
            self.queue.shutdown();
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "queue worker did not finish");
            }
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if self.queue.is_running() {
            self.queue.shutdown();
        }
    }
}
