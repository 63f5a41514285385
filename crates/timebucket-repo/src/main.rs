//! timebucket demo daemon
//!
//! Loads `timebucket.yaml` (or the path given as first argument), records a
//! few bucketed metrics every second, and shuts the repository down cleanly
//! on Ctrl-C so counters are backed up one last time.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use timebucket_core::{MetricKind, TemporalMetricId};
use timebucket_repo::{config, InMemoryRegistry, MetricRepository};

#[tokio::main]
async fn main() -> timebucket_core::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "timebucket.yaml".to_string());
    let cfg = config::load_from_file(&path)?;

    let registry = Arc::new(InMemoryRegistry::new());
    let repo = MetricRepository::from_config(registry.clone(), &cfg)?;
    repo.start()?;

    let requests = TemporalMetricId::minutely(MetricKind::Counter)
        .owner_scope(module_path!())
        .name("requests")
        .build()?;
    let latency = TemporalMetricId::minutely(MetricKind::Timer)
        .owner_scope(module_path!())
        .name("latency")
        .build()?;

    tracing::info!(config=%path, "timebucket demo running, Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = tick.tick() => {
                let timer = repo.timer(&latency)?;
                let _t = timer.time();
                repo.counter(&requests)?.inc();
                repo.daily_counter(module_path!(), "requests")?.inc();
            }
        }
    }

    repo.shutdown().await;
    tracing::info!(metrics = registry.len(), "bye");
    Ok(())
}
