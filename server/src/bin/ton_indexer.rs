//! Hot-wallet deposit indexer.
//!
//! Single-writer: exactly one instance may run against a given cursor.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use admarket::config::Config;
use admarket::db;
use admarket::events::{Publisher, RedisPublisher};
use admarket::kv::{init_redis_pool, KvStore, RedisKv};
use admarket::services::TonIndexer;
use admarket::telemetry::init_tracing;
use admarket::ton::{ChainApi, TonHttpClient};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env();

    if config.ton_hot_wallet_address.is_empty() {
        anyhow::bail!("TON_HOT_WALLET_ADDRESS is required");
    }

    let pool = db::create_pool(&config.database_url, 5)?;
    db::run_migrations(&pool).context("migrations failed")?;

    let redis_pool = init_redis_pool(&config.redis_url)?;
    let kv: Arc<dyn KvStore> = Arc::new(RedisKv::new(redis_pool.clone()));
    let publisher: Arc<dyn Publisher> = Arc::new(RedisPublisher::new(redis_pool));
    let chain: Arc<dyn ChainApi> = Arc::new(TonHttpClient::new(&config.ton_api_base_url)?);

    info!(
        hot_wallet = %config.ton_hot_wallet_address,
        network = %config.ton_network,
        "TON indexer started"
    );

    let indexer = Arc::new(TonIndexer::new(
        chain,
        kv,
        pool,
        publisher,
        config.ton_hot_wallet_address.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let indexer_task = tokio::spawn(indexer.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down TON indexer");
    let _ = shutdown_tx.send(true);

    let _ = indexer_task.await;
    Ok(())
}
