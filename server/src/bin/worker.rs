//! Lifecycle worker: timeout sweeps, hold release, post-presence checks.
//!
//! Deploy at most one instance; the sweeps assume a single writer.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use admarket::config::Config;
use admarket::db;
use admarket::events::{Publisher, RedisPublisher};
use admarket::kv::init_redis_pool;
use admarket::services::{
    DealService, HoldReleaseWorker, PostMonitor, TimeoutSweeper, TmePageClient,
};
use admarket::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env();
    config.warn_on_defaults();

    let pool = db::create_pool(&config.database_url, 10)?;
    db::run_migrations(&pool).context("migrations failed")?;

    let redis_pool = init_redis_pool(&config.redis_url)?;
    let publisher: Arc<dyn Publisher> = Arc::new(RedisPublisher::new(redis_pool));

    let deals = Arc::new(DealService::new(
        pool.clone(),
        publisher,
        config.ton_hot_wallet_address.clone(),
        config.platform_fee_bps,
        config.hold_period_seconds,
    ));

    let fetcher = Arc::new(TmePageClient::new(
        "https://t.me",
        config.tme_fetch_timeout,
        config.tme_fetch_max_retries,
    )?);

    let sweeper = Arc::new(TimeoutSweeper::new(
        pool.clone(),
        deals.clone(),
        config.deal_timeout_submitted_secs,
        config.deal_timeout_payment_secs,
        config.deal_timeout_creative_secs,
    ));
    let hold_release = Arc::new(HoldReleaseWorker::new(pool.clone(), deals.clone()));
    let post_monitor = Arc::new(PostMonitor::new(pool, deals, fetcher));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!("worker started");

    let sweeper_task = tokio::spawn(sweeper.run(shutdown_rx.clone()));
    let hold_task = tokio::spawn(hold_release.run(shutdown_rx.clone()));
    let monitor_task = tokio::spawn(post_monitor.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down worker");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(sweeper_task, hold_task, monitor_task);
    Ok(())
}
