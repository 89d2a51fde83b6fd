//! # Work-execution facility.
//!
//! The bus never spawns listener work directly; it hands a [`Job`] to an
//! [`Executor`]. An executor either accepts the job or gives it back:
//!
//! ```text
//! execute(job)
//!   ├─ Ok(())                     → job runs on the pool
//!   ├─ Err(Unavailable(job))      → caller runs it inline (degraded, still correct)
//!   └─ Err(Closed(job))           → facility is gone for good
//! ```
//!
//! [`TokioExecutor`] spawns onto a tokio runtime and can cap the number of
//! jobs in flight:
//! - `max_concurrent = 0` → unlimited (no semaphore created)
//! - `max_concurrent = n` → at most `n` jobs; the `n+1`-th is `Unavailable`

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, TryAcquireError};

/// Unit of work accepted by an [`Executor`].
pub type Job = BoxFuture<'static, ()>;

/// Why an executor refused a job. The job is handed back in both cases.
pub enum Rejected {
    /// Temporarily saturated; run the job some other way.
    Unavailable(Job),
    /// Shut down; no further job will ever be accepted.
    Closed(Job),
}

impl Rejected {
    /// Returns the refused job.
    pub fn into_job(self) -> Job {
        match self {
            Rejected::Unavailable(job) | Rejected::Closed(job) => job,
        }
    }

    /// True if the executor will never accept work again.
    pub fn is_closed(&self) -> bool {
        matches!(self, Rejected::Closed(_))
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Rejected::Unavailable(_) => "executor_unavailable",
            Rejected::Closed(_) => "executor_closed",
        }
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Accepts units of work for asynchronous execution.
pub trait Executor: Send + Sync + 'static {
    /// Schedules `job` or hands it back.
    fn execute(&self, job: Job) -> Result<(), Rejected>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Executor backed by a tokio runtime handle.
pub struct TokioExecutor {
    handle: Handle,
    permits: Option<Arc<Semaphore>>,
    closed: AtomicBool,
}

impl TokioExecutor {
    /// Creates an unlimited executor spawning onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            permits: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates an unlimited executor on the current runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Caps jobs in flight (`0` = unlimited).
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.permits = match max_concurrent {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        self
    }

    /// Stops accepting jobs; jobs already spawned run to completion.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(permits) = &self.permits {
            permits.close();
        }
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Free slots, `None` when unlimited.
    pub fn available_permits(&self) -> Option<usize> {
        self.permits.as_ref().map(|p| p.available_permits())
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) -> Result<(), Rejected> {
        if self.is_closed() {
            return Err(Rejected::Closed(job));
        }

        let permit = match &self.permits {
            None => None,
            Some(permits) => match Arc::clone(permits).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(TryAcquireError::NoPermits) => return Err(Rejected::Unavailable(job)),
                Err(TryAcquireError::Closed) => return Err(Rejected::Closed(job)),
            },
        };

        self.handle.spawn(async move {
            job.await;
            drop(permit);
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn unlimited_executor_runs_jobs() {
        let exec = TokioExecutor::current();
        let (tx, rx) = oneshot::channel();
        exec.execute(async move {
            let _ = tx.send(42);
        }
        .boxed())
        .unwrap();
        assert_eq!(rx.await.unwrap(), 42);
        assert_eq!(exec.available_permits(), None);
    }

    #[tokio::test]
    async fn saturated_executor_hands_the_job_back() {
        let exec = TokioExecutor::current().with_max_concurrent(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        exec.execute(async move {
            let _ = release_rx.await;
        }
        .boxed())
        .unwrap();
        assert_eq!(exec.available_permits(), Some(0));

        let ran = Arc::new(AtomicUsize::new(0));
        let job = {
            let ran = Arc::clone(&ran);
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        };
        let rejected = exec.execute(job).unwrap_err();
        assert!(!rejected.is_closed());
        assert_eq!(rejected.as_label(), "executor_unavailable");

        rejected.into_job().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        let _ = release_tx.send(());
    }

    #[tokio::test]
    async fn closed_executor_refuses_work() {
        let exec = TokioExecutor::current().with_max_concurrent(4);
        exec.close();
        assert!(exec.is_closed());

        let rejected = exec.execute(async {}.boxed()).unwrap_err();
        assert!(rejected.is_closed());
        assert_eq!(format!("{rejected:?}"), "executor_closed");
    }
}
