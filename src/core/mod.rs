//! Runtime core: the bus, its queue worker and dispatch.
//!
//! The public API from this module is [`EventBus`] (built with
//! [`EventBusBuilder`]) and its [`BusConfig`].
//!
//! Internal modules:
//! - [`bus`]: listener registration, `notify`, reload and shutdown;
//! - [`builder`]: wires collaborators and spawns the worker;
//! - [`dispatch`]: runs listener callbacks with failure isolation;
//! - [`worker`]: drains due entries from the delay queue.

mod builder;
mod bus;
mod config;
mod dispatch;
mod worker;


pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use config::BusConfig;
pub use dispatch::Notification;
pub use worker::{WorkerExit, WorkerStatus};
