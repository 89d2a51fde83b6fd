//! # Example: coalescing
//!
//! Demonstrates how bursts of local cache changes collapse into one delivery
//! while changes from peer nodes go straight through.
//!
//! Shows how to:
//! - Implement the [`Listener`] trait.
//! - Register global and region listeners on an [`EventBus`].
//! - Read the offered/delivered counters from [`CounterMetrics`].
//!
//! ## Flow
//! ```text
//! t=0.0  notify(local,  users/42) ──► queued   (offered=1)
//! t=0.3  notify(local,  users/42) ──► merged
//! t=0.6  notify(local,  users/42) ──► merged
//! t=0.9  notify(remote, users/7)  ──► delivered now
//! t=1.6  worker drains users/42   ──► delivered once (delivered=1)
//! ```
//!
//! ## Run
//! Requires the `logging` feature to export [`LogListener`].
//! ```bash
//! cargo run --example coalescing --features logging
//! ```

use std::{sync::Arc, time::Duration};

use cachebus::{
    BusConfig, BusMetrics, CacheEvent, CounterMetrics, EventBus, Listener, ListenerError,
    ListenerRef, LogListener,
};
use tracing_subscriber::EnvFilter;

/// Pretends to push changes to a second-level cache.
/// In real life, you could evict from Redis, fan out to peers, or bump stats.
struct SecondTier;

#[async_trait::async_trait]
impl Listener for SecondTier {
    async fn on_event(
        &self,
        _sender: Option<&ListenerRef>,
        event: &CacheEvent,
        from_remote: bool,
    ) -> Result<(), ListenerError> {
        let keys: Vec<&str> = event.keys().collect();
        println!(
            "[tier2] {} region={} keys={:?} remote={}",
            event.kind().as_label(),
            event.region().unwrap_or("<all>"),
            keys,
            from_remote
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "second-tier"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = BusConfig {
        min_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(5),
        ..BusConfig::default()
    };
    let metrics = Arc::new(CounterMetrics::new());
    let bus = EventBus::builder(cfg)
        .with_metrics(metrics.clone() as Arc<dyn BusMetrics>)
        .build()?;

    bus.add_listener(Arc::new(LogListener::new()));
    bus.add_region_listener("users", Arc::new(SecondTier));

    for _ in 0..3 {
        bus.notify(None, CacheEvent::invalidate("users", "42"), false)
            .await;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    bus.notify(None, CacheEvent::invalidate("users", "7"), true)
        .await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    println!(
        "offered={} delivered={} pending={}",
        metrics.offered(),
        metrics.delivered(),
        bus.pending()
    );

    bus.shutdown().await;
    Ok(())
}
