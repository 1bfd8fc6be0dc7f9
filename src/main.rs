//! lru_ttl demo binary
//!
//! Builds a cache from environment configuration, drives a short workload
//! through it and prints the resulting statistics as JSON.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lru_ttl::{Cache, Config};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and its sweep task
/// 4. Run the demo workload until it finishes or Ctrl+C arrives
/// 5. Print stats and close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lru_ttl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::try_from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: capacity={}, sweep_interval={}s, demo_keys={}, demo_ttl={}s",
        config.capacity, config.sweep_interval_secs, config.demo_keys, config.demo_ttl_secs
    );

    let cache = Cache::<String, u64>::builder()
        .capacity(config.capacity)
        .sweep_interval_secs(config.sweep_interval_secs)
        .on_evicted(|key: &String, value: &u64| debug!(key = %key, value = *value, "Entry evicted"))
        .build()
        .context("Failed to create cache")?;

    tokio::select! {
        result = run_demo(&cache, &config) => result?,
        _ = signal::ctrl_c() => info!("Received Ctrl+C, stopping demo"),
    }

    let stats = cache.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    cache.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn run_demo(cache: &Cache<String, u64>, config: &Config) -> anyhow::Result<()> {
    // Every other key expires
    for i in 0..config.demo_keys {
        let ttl = if i % 2 == 0 { config.demo_ttl_secs } else { 0 };
        cache.add(format!("key-{}", i), i as u64, ttl).await?;
    }

    let mut hits = 0;
    for i in 0..config.demo_keys {
        if cache.get(&format!("key-{}", i)).await.is_some() {
            hits += 1;
        }
    }
    let len = cache.len().await;
    info!(hits, len, "Initial reads done");

    let counter = "counter".to_string();
    for _ in 0..3 {
        cache
            .compare_and_set(&counter, |current, txn| {
                txn.add(counter.clone(), current.unwrap_or(0) + 1, 0)
            })
            .await?;
    }

    if config.demo_ttl_secs > 0 {
        let wait = config.demo_ttl_secs as u64 + config.sweep_interval_secs.max(1) + 1;
        info!("Waiting {}s for TTLs to run out", wait);
        tokio::time::sleep(Duration::from_secs(wait)).await;

        if config.sweep_interval_secs == 0 {
            let purged = cache.purge_expired().await;
            info!(purged, "No sweep task configured, purged expired entries directly");
        }
    }

    let mut live = 0;
    cache
        .range(|_, _, _| {
            live += 1;
            true
        })
        .await;
    let len = cache.len().await;
    let next_expiration = cache.next_expiration().await;
    info!(live, len, ?next_expiration, "Demo finished");
    Ok(())
}
