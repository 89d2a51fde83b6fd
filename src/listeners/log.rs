//! # LogListener: simple event logger
//!
//! A minimal listener that writes every delivered [`CacheEvent`] through
//! `tracing`. Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO cachebus: cache change kind="invalidate" region=Some("users") keys=["user:42"] remote=false seq=7
//! INFO cachebus: cache change kind="clear" region=None keys=[] remote=true seq=8
//! ```

use async_trait::async_trait;

use crate::error::ListenerError;
use crate::events::CacheEvent;
use crate::listeners::{Listener, ListenerRef};

/// Event logging listener.
#[derive(Default)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Listener for LogListener {
    async fn on_event(
        &self,
        sender: Option<&ListenerRef>,
        e: &CacheEvent,
        from_remote: bool,
    ) -> Result<(), ListenerError> {
        let keys: Vec<&str> = e.keys().collect();
        tracing::info!(
            target: "cachebus",
            kind = e.kind().as_label(),
            region = ?e.region(),
            keys = ?keys,
            remote = from_remote,
            sender = sender.map(|s| s.name()).unwrap_or("-"),
            seq = e.seq(),
            "cache change"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "LogListener"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_listener_never_fails() {
        let l = LogListener::new();
        let res = l
            .on_event(None, &CacheEvent::invalidate("users", "user:42"), false)
            .await;
        assert!(res.is_ok());
        assert_eq!(l.name(), "LogListener");
    }
}
