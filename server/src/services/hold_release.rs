//! Hold release: completes deals whose post survived the hold period.
//!
//! Runs every minute. A deal qualifies when its post was published more
//! than `hold_period_seconds` ago and is neither deleted nor edited. The
//! `hold_verification → completed` transition is valid exactly once, so a
//! concurrent sweep cannot double-release.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info};

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::models::Deal;
use crate::services::deal::DealService;

pub const HOLD_RELEASE_INTERVAL: Duration = Duration::from_secs(60);

pub struct HoldReleaseWorker {
    db: DbPool,
    deals: Arc<DealService>,
}

impl HoldReleaseWorker {
    pub fn new(db: DbPool, deals: Arc<DealService>) -> Self {
        Self { db, deals }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval(HOLD_RELEASE_INTERVAL);
        info!("hold release worker started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.release_once().await {
                        error!(error = %e, "hold release pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("hold release worker shutting down");
                    break;
                }
            }
        }
    }

    pub async fn release_once(&self) -> Result<(), ApiError> {
        let rows = with_conn(&self.db, Deal::in_hold_with_posts).await?;
        let now = Utc::now().naive_utc();

        for (deal, post) in rows {
            if post.is_deleted || post.is_edited {
                continue;
            }
            let Some(posted_at) = post.posted_at else {
                continue;
            };
            let hold = chrono::Duration::seconds(deal.hold_period_seconds as i64);
            if posted_at + hold >= now {
                continue;
            }

            info!(deal_id = %deal.id, "hold period elapsed, releasing funds");
            if let Err(e) = self.deals.release_funds(&deal.id).await {
                error!(deal_id = %deal.id, error = %e, "failed to release funds");
            }
        }
        Ok(())
    }
}
