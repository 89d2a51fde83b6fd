use std::sync::Arc;

use parking_lot::Mutex;

use super::bus::EventBus;
use super::config::BusConfig;
use super::dispatch::Dispatcher;
use super::worker::{QueueWorker, WorkerStatus};
use crate::error::BusError;
use crate::exec::{Executor, TokioExecutor};
use crate::listeners::ListenerRegistry;
use crate::metrics::BusMetrics;
use crate::queue::DelayQueue;

/// Builder for constructing an [`EventBus`] with optional collaborators.
pub struct EventBusBuilder {
    cfg: BusConfig,
    registry: Option<Arc<ListenerRegistry>>,
    executor: Option<Arc<dyn Executor>>,
    metrics: Option<Arc<dyn BusMetrics>>,
    inline: bool,
}

impl EventBusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            registry: None,
            executor: None,
            metrics: None,
            inline: false,
        }
    }

    /// Uses an existing listener registry instead of an empty one.
    pub fn with_registry(mut self, registry: Arc<ListenerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the executor listener work is handed to.
    ///
    /// Without one, a [`TokioExecutor`] on the current runtime is used.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self.inline = false;
        self
    }

    /// Dispatches on the calling task (remote events) or the worker (queued ones).
    pub fn inline(mut self) -> Self {
        self.executor = None;
        self.inline = true;
        self
    }

    /// Sets the sink for offered/delivered counters.
    pub fn with_metrics(mut self, metrics: Arc<dyn BusMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates the configuration, spawns the queue worker and returns the bus.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn build(self) -> Result<Arc<EventBus>, BusError> {
        let delays = self.cfg.delays()?;

        let executor = match (self.executor, self.inline) {
            (Some(executor), _) => Some(executor),
            (None, true) => None,
            (None, false) => Some(Arc::new(TokioExecutor::current()) as Arc<dyn Executor>),
        };
        let dispatcher = Arc::new(Dispatcher::new(executor, self.metrics));
        let queue = Arc::new(DelayQueue::new(delays));
        let registry = self.registry.unwrap_or_default();

        let status = Arc::new(Mutex::new(WorkerStatus::Running));
        let worker = QueueWorker::new(Arc::clone(&queue), Arc::clone(&dispatcher))
            .spawn(Arc::clone(&status));

        tracing::debug!(
            min_delay = ?self.cfg.min_delay,
            max_delay = ?self.cfg.max_delay,
            inline = !dispatcher.has_executor(),
            "event bus started"
        );

        Ok(Arc::new(EventBus::from_parts(
            self.cfg, registry, queue, dispatcher, worker, status,
        )))
    }
}
