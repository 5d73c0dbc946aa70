//! Post monitor: verifies that held posts are still present and unmodified.
//!
//! Every five minutes it re-fetches each held post via the chat-page
//! collaborator. A missing post sets `is_deleted` and refunds the deal. A
//! content-hash mismatch sets `is_edited` but does not refund. A one-second
//! pause between deals keeps the page fetches polite.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::models::{Channel, Deal, DealPost};
use crate::services::deal::DealService;
use crate::services::tme_client::{message_id_from_url, PostFetcher};

pub const POST_MONITOR_INTERVAL: Duration = Duration::from_secs(300);
pub const PER_DEAL_PAUSE: Duration = Duration::from_secs(1);

pub struct PostMonitor {
    db: DbPool,
    deals: Arc<DealService>,
    fetcher: Arc<dyn PostFetcher>,
    pause: Duration,
}

impl PostMonitor {
    pub fn new(db: DbPool, deals: Arc<DealService>, fetcher: Arc<dyn PostFetcher>) -> Self {
        Self {
            db,
            deals,
            fetcher,
            pause: PER_DEAL_PAUSE,
        }
    }

    /// Test constructor without the inter-deal pause.
    pub fn without_pause(db: DbPool, deals: Arc<DealService>, fetcher: Arc<dyn PostFetcher>) -> Self {
        Self {
            db,
            deals,
            fetcher,
            pause: Duration::ZERO,
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval(POST_MONITOR_INTERVAL);
        info!("post monitor started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.check_once().await {
                        error!(error = %e, "post monitoring pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("post monitor shutting down");
                    break;
                }
            }
        }
    }

    pub async fn check_once(&self) -> Result<(), ApiError> {
        let rows = with_conn(&self.db, Deal::in_hold_with_posts).await?;

        for (deal, post) in rows {
            if post.is_deleted {
                continue;
            }

            let channel_id = deal.channel_id.clone();
            let channel = match with_conn(&self.db, move |conn| Channel::find(conn, &channel_id)).await
            {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(deal_id = %deal.id, error = %e, "channel lookup failed");
                    continue;
                }
            };

            let message_id = post
                .telegram_message_id
                .or_else(|| post.post_url.as_deref().and_then(message_id_from_url));
            let Some(message_id) = message_id else {
                warn!(deal_id = %deal.id, "held post has no resolvable message id");
                continue;
            };

            match self.fetcher.fetch_post(&channel.username, message_id).await {
                Ok(check) if !check.exists => {
                    warn!(deal_id = %deal.id, message_id, "post deletion detected");
                    let deal_id = deal.id.clone();
                    if let Err(e) = with_conn(&self.db, move |conn| {
                        DealPost::update_flags(conn, &deal_id, true, false)
                    })
                    .await
                    {
                        error!(deal_id = %deal.id, error = %e, "failed to flag deleted post");
                        continue;
                    }
                    if let Err(e) = self.deals.refund_deal(&deal.id).await {
                        error!(deal_id = %deal.id, error = %e, "failed to refund deal");
                    }
                }
                Ok(check) => {
                    let edited = match (&post.content_hash, &check.text) {
                        (Some(stored), Some(current)) => {
                            let current_hash = hex::encode(Sha256::digest(current.as_bytes()));
                            current_hash != *stored
                        }
                        _ => false,
                    };
                    if edited && !post.is_edited {
                        // Detected, recorded, not auto-refunded.
                        warn!(deal_id = %deal.id, "post edit detected");
                        let deal_id = deal.id.clone();
                        if let Err(e) = with_conn(&self.db, move |conn| {
                            DealPost::update_flags(conn, &deal_id, false, true)
                        })
                        .await
                        {
                            error!(deal_id = %deal.id, error = %e, "failed to flag edited post");
                        }
                    } else {
                        let deal_id = deal.id.clone();
                        let _ = with_conn(&self.db, move |conn| {
                            DealPost::touch_checked(conn, &deal_id)
                        })
                        .await;
                    }
                }
                Err(e) => {
                    warn!(deal_id = %deal.id, error = %e, "failed to check post, retrying next pass");
                }
            }

            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }
        Ok(())
    }
}
