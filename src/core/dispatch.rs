//! # Dispatch: running listener callbacks for one notification.
//!
//! ## Flow
//! ```text
//! Dispatcher::submit(task)
//!     ├─ no executor          ─► task.run() inline
//!     └─ executor.execute(job)
//!          ├─ Ok               ─► runs on the pool
//!          ├─ Unavailable(job) ─► job inline (debug log)
//!          └─ Closed(job)      ─► job inline, reported to the caller
//!
//! NotificationTask::run()
//!     for listener in snapshot (registration order):
//!         on_event(sender, event, from_remote)
//!             ├─ Ok     ─► next
//!             ├─ Err(e) ─► log error, next
//!             └─ panic  ─► catch_unwind, log error, next
//!     queued entry? ─► metrics.increment_delivered_events(region)
//! ```
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a listener uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;

use crate::events::{CacheEvent, Condition};
use crate::exec::{Executor, Rejected};
use crate::listeners::ListenerRef;
use crate::metrics::BusMetrics;

/// A resolved event waiting for (or undergoing) delivery.
///
/// The listener snapshot is taken once, when the notification is created, and
/// stays authoritative even if the entry is merged later.
pub struct Notification {
    event: Arc<CacheEvent>,
    listeners: Arc<[ListenerRef]>,
    sender: Option<ListenerRef>,
    from_remote: bool,
}

impl Notification {
    pub(crate) fn new(
        event: Arc<CacheEvent>,
        listeners: Vec<ListenerRef>,
        sender: Option<ListenerRef>,
        from_remote: bool,
    ) -> Self {
        Self {
            event,
            listeners: listeners.into(),
            sender,
            from_remote,
        }
    }

    /// The change being delivered.
    pub fn event(&self) -> &Arc<CacheEvent> {
        &self.event
    }

    /// Listeners that will be called, in order.
    pub fn listeners(&self) -> &[ListenerRef] {
        &self.listeners
    }

    /// Originator of the change (never among [`listeners`](Self::listeners)).
    pub fn sender(&self) -> Option<&ListenerRef> {
        self.sender.as_ref()
    }

    /// True if the change came from a peer node.
    pub fn is_remote(&self) -> bool {
        self.from_remote
    }

    /// Relevance predicate carried over from the event.
    pub fn condition(&self) -> Option<&Condition> {
        self.event.condition()
    }
}

/// One unit of dispatch work: a notification plus its metrics sink.
pub(crate) struct NotificationTask {
    notification: Notification,
    metrics: Option<Arc<dyn BusMetrics>>,
}

impl NotificationTask {
    /// A task for a remote event; delivery is not counted.
    pub(crate) fn immediate(notification: Notification) -> Self {
        Self {
            notification,
            metrics: None,
        }
    }

    /// A task for an entry drained from the queue.
    pub(crate) fn queued(notification: Notification, metrics: Option<Arc<dyn BusMetrics>>) -> Self {
        Self {
            notification,
            metrics,
        }
    }

    /// Calls every listener, isolating failures from each other.
    pub(crate) async fn run(self) {
        let n = &self.notification;

        for listener in n.listeners.iter() {
            let call = listener.on_event(n.sender.as_ref(), &n.event, n.from_remote);
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(
                        listener = listener.name(),
                        label = err.as_label(),
                        error = %err,
                        event = ?n.event,
                        remote = n.from_remote,
                        "listener failed"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        listener = listener.name(),
                        panic = %panic_message(panic.as_ref()),
                        event = ?n.event,
                        remote = n.from_remote,
                        "listener panicked"
                    );
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.increment_delivered_events(n.event.region());
        }
    }
}

fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// How a submitted task ended up running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submit {
    /// Accepted by the executor.
    Scheduled,
    /// Ran inline (no executor, or executor saturated).
    Inline,
    /// Ran inline because the executor is closed for good.
    Closed,
}

/// Routes notification tasks to the current executor.
pub(crate) struct Dispatcher {
    executor: RwLock<Option<Arc<dyn Executor>>>,
    metrics: Option<Arc<dyn BusMetrics>>,
}

impl Dispatcher {
    pub(crate) fn new(
        executor: Option<Arc<dyn Executor>>,
        metrics: Option<Arc<dyn BusMetrics>>,
    ) -> Self {
        Self {
            executor: RwLock::new(executor),
            metrics,
        }
    }

    pub(crate) fn metrics(&self) -> Option<&Arc<dyn BusMetrics>> {
        self.metrics.as_ref()
    }

    pub(crate) fn set_executor(&self, executor: Option<Arc<dyn Executor>>) {
        *self.executor.write() = executor;
    }

    pub(crate) fn has_executor(&self) -> bool {
        self.executor.read().is_some()
    }

    /// Hands `task` to the executor, or runs it inline when that is not possible.
    pub(crate) async fn submit(&self, task: NotificationTask) -> Submit {
        let executor = self.executor.read().clone();
        let Some(executor) = executor else {
            task.run().await;
            return Submit::Inline;
        };

        match executor.execute(task.run().boxed()) {
            Ok(()) => Submit::Scheduled,
            Err(Rejected::Unavailable(job)) => {
                tracing::debug!(
                    executor = executor.name(),
                    "executor unavailable; dispatching inline"
                );
                job.await;
                Submit::Inline
            }
            Err(Rejected::Closed(job)) => {
                job.await;
                Submit::Closed
            }
        }
    }
}
