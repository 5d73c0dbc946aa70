//! Timeout sweeper: auto-cancels deals stuck in a waiting status.
//!
//! Every two minutes it selects deals whose `updated_at` is older than the
//! per-status timeout and cancels them on the advertiser's behalf. Invalid
//! transitions (the deal moved under us) are logged and skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::models::deal::{DEAL_AWAITING_PAYMENT, DEAL_CREATIVE_SUBMITTED, DEAL_SUBMITTED};
use crate::models::Deal;
use crate::services::deal::DealService;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(120);

pub struct TimeoutSweeper {
    db: DbPool,
    deals: Arc<DealService>,
    timeouts: Vec<(&'static str, i64)>,
}

impl TimeoutSweeper {
    pub fn new(
        db: DbPool,
        deals: Arc<DealService>,
        submitted_secs: i64,
        payment_secs: i64,
        creative_secs: i64,
    ) -> Self {
        Self {
            db,
            deals,
            timeouts: vec![
                (DEAL_SUBMITTED, submitted_secs),
                (DEAL_AWAITING_PAYMENT, payment_secs),
                (DEAL_CREATIVE_SUBMITTED, creative_secs),
            ],
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval(SWEEP_INTERVAL);
        info!("timeout sweeper started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "timeout sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("timeout sweeper shutting down");
                    break;
                }
            }
        }
    }

    /// One sweep over all `(status, timeout)` pairs.
    pub async fn sweep_once(&self) -> Result<(), ApiError> {
        for &(status, timeout_secs) in &self.timeouts {
            let stale = with_conn(&self.db, move |conn| {
                Deal::timed_out(conn, status, timeout_secs)
            })
            .await?;

            for deal in stale {
                info!(deal_id = %deal.id, status = %deal.status, "auto-cancelling timed out deal");
                if let Err(e) = self
                    .deals
                    .cancel_deal(&deal.id, &deal.advertiser_user_id)
                    .await
                {
                    error!(deal_id = %deal.id, error = %e, "failed to cancel timed out deal");
                }
            }
        }
        Ok(())
    }
}
