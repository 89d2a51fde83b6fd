//! Work-execution facility used to run listener dispatch.
//!
//! ## Contents
//! - [`Executor`] accepts a [`Job`] or hands it back as [`Rejected`]
//! - [`TokioExecutor`] tokio-backed implementation with an optional in-flight cap

mod executor;

pub use executor::{Executor, Job, Rejected, TokioExecutor};
