use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{error, info};

mod api;
mod cache;
mod cli;
mod config;
mod probe;
mod scheduler;
mod state;
mod status;

use api::StatusApi;
use cache::LocalCache;
use config::{Mode, StatuswatchConfig};
use probe::Prober;
use scheduler::PollingScheduler;
use status::ServiceStatus;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match StatuswatchConfig::try_init() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let api = match (config.mode, &config.api_base) {
        (Mode::Backend, Some(base)) => Some(StatusApi::new(
            base.clone(),
            config.api_key(),
            config.request_timeout(),
        )),
        _ => None,
    };
    let prober = match config.mode {
        Mode::SelfProbe => Some(Prober::new(
            config.request_timeout(),
            config.degraded_threshold(),
        )),
        Mode::Backend => None,
    };
    let cache = config
        .cache
        .enabled
        .then(|| LocalCache::new(config.cache.dir.clone(), config.cache_freshness()));

    // Seed from the cache when it is fresh enough, otherwise from the
    // static defaults. A stale cache is never shown as current.
    let defaults: Vec<ServiceStatus> = config
        .services
        .iter()
        .map(|s| ServiceStatus::unobserved(&s.name))
        .collect();
    let (services, incidents, seeded_at) = cache
        .as_ref()
        .and_then(|c| c.load(Utc::now()))
        .map(|(services, incidents, saved_at)| {
            info!("seeded state from snapshot cached at {saved_at}");
            (services, incidents, Some(saved_at))
        })
        .unwrap_or((defaults, Vec::new(), None));

    let (scheduler, mut updates) =
        PollingScheduler::new(config, api, prober, cache, services, incidents, seeded_at);
    let scheduler = Arc::new(scheduler);

    // Stand-in for a render layer: log overall-status transitions.
    let mut last_overall = updates.borrow().overall();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update();
            let overall = snapshot.overall();
            if overall != last_overall {
                info!(
                    "overall status changed: {last_overall} -> {overall} ({} failures pending)",
                    snapshot.consecutive_failures
                );
                last_overall = overall;
            }
        }
    });

    let runner = Arc::clone(&scheduler);
    let run = tokio::spawn(async move { runner.run().await });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => error!("failed to listen for shutdown signal: {e}"),
    }
    scheduler.cancel().await;

    // Give the scheduler a moment to abort in-flight work cleanly.
    let _ = tokio::time::timeout(Duration::from_secs(5), run).await;
}
