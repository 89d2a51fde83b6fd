//! # Queue worker: drains due entries and dispatches them.
//!
//! One worker per bus. It is the only consumer of the delay queue.
//!
//! ## Loop
//! ```text
//! loop:
//!   take()            (blocks until the head is due)
//!     ├─ Poison       ─► exit Shutdown
//!     └─ Live(first)
//!   drain_to(rest)    (everything else already due, no waiting)
//!   dispatch [first, rest..] in queue order
//!     └─ executor Closed ─► rest of the batch inline, exit ExecutorClosed
//!   poison seen in rest? ─► exit Shutdown
//! ```
//!
//! ## Rules
//! - The worker is never restarted; an exit other than `Shutdown` leaves the
//!   bus degraded (see [`EventBus::is_degraded`](crate::EventBus::is_degraded)).
//! - Entries still pending when the poison reaches the head are dropped.
//! - Panics escaping a dispatch are caught at the task boundary and reported
//!   as [`WorkerExit::Panicked`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::dispatch::{Dispatcher, Notification, NotificationTask, Submit};
use crate::events::EventIdentity;
use crate::queue::{DelayQueue, Delayed, QueueEntry};

pub(crate) type NotificationQueue = DelayQueue<EventIdentity, Notification>;

/// Why the queue worker stopped.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The poison sentinel was consumed.
    Shutdown,
    /// The executor refused work permanently.
    ExecutorClosed,
    /// The worker task panicked.
    Panicked,
}

impl WorkerExit {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerExit::Shutdown => "worker_shutdown",
            WorkerExit::ExecutorClosed => "worker_executor_closed",
            WorkerExit::Panicked => "worker_panicked",
        }
    }

    /// True for the orderly exit.
    pub fn is_clean(&self) -> bool {
        matches!(self, WorkerExit::Shutdown)
    }
}

/// Lifecycle state of the queue worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// The worker is draining the queue.
    Running,
    /// The worker stopped and will not be restarted.
    Exited(WorkerExit),
}

pub(crate) struct QueueWorker {
    queue: Arc<NotificationQueue>,
    dispatcher: Arc<Dispatcher>,
}

impl QueueWorker {
    pub(crate) fn new(queue: Arc<NotificationQueue>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { queue, dispatcher }
    }

    /// Spawns the worker; `status` is updated when it exits.
    pub(crate) fn spawn(self, status: Arc<Mutex<WorkerStatus>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let exit = AssertUnwindSafe(self.run())
                .catch_unwind()
                .await
                .unwrap_or(WorkerExit::Panicked);

            if exit.is_clean() {
                tracing::debug!("queue worker stopped");
            } else {
                tracing::error!(
                    reason = exit.as_label(),
                    "queue worker exited; local events will no longer be delivered"
                );
            }
            *status.lock() = WorkerStatus::Exited(exit);
        })
    }

    async fn run(self) -> WorkerExit {
        let mut drained = Vec::new();
        loop {
            let first = match self.queue.take().await {
                QueueEntry::Poison => return WorkerExit::Shutdown,
                QueueEntry::Live(entry) => entry,
            };

            self.queue.drain_to(&mut drained);
            let mut poisoned = false;
            let mut batch = Vec::with_capacity(drained.len() + 1);
            batch.push(first);
            for entry in drained.drain(..) {
                match entry {
                    QueueEntry::Poison => poisoned = true,
                    QueueEntry::Live(entry) => batch.push(entry),
                }
            }

            if let Some(exit) = self.dispatch(batch).await {
                return exit;
            }
            if poisoned {
                return WorkerExit::Shutdown;
            }
        }
    }

    async fn dispatch(&self, batch: Vec<Delayed<Notification>>) -> Option<WorkerExit> {
        tracing::trace!(batch = batch.len(), "dispatching due entries");

        let mut closed = false;
        for entry in batch {
            tracing::trace!(merges = entry.merges(), "entry due");
            let metrics = self.dispatcher.metrics().cloned();
            let task = NotificationTask::queued(entry.into_inner(), metrics);

            if closed {
                task.run().await;
                continue;
            }
            if self.dispatcher.submit(task).await == Submit::Closed {
                tracing::error!("executor closed; finishing batch inline");
                closed = true;
            }
        }
        closed.then_some(WorkerExit::ExecutorClosed)
    }
}
