//! Channel management: registration, membership, listings, stats reads.

use std::sync::Arc;

use diesel::OptionalExtension;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::models::audit::ACTOR_USER;
use crate::models::channel::{normalize_username, ROLE_MANAGER, ROLE_OWNER, MAX_CHANNEL_MEMBERS};
use crate::models::listing::LISTING_ACTIVE;
use crate::models::{
    AuditEntry, Channel, ChannelFilter, ChannelListing, ChannelMember, ListingUpdate,
    NewAuditEntry, NewChannel, NewChannelMember, StatsSnapshot, User,
};
use crate::services::bot_client::{AdminInfo, BotApi};
use crate::ton::parse_ton_to_nano;

pub struct ChannelService {
    db: DbPool,
    bot: Arc<dyn BotApi>,
}

/// Explore-page filters on top of the channel search.
#[derive(Debug, Default, Clone)]
pub struct ExploreFilter {
    pub channels: ChannelFilter,
    pub category: Option<String>,
    pub language: Option<String>,
    pub min_subscribers: Option<i32>,
    pub min_avg_views: Option<i32>,
}

/// Marketplace card for the explore page: channel plus offer plus the
/// latest stats snapshot.
#[derive(Debug, Serialize)]
pub struct ExploreChannel {
    pub id: String,
    pub username: String,
    pub title: Option<String>,
    pub subscribers: Option<i32>,
    pub avg_views: Option<i32>,
    pub er_percent: Option<f64>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub price_post_ton: Option<String>,
    pub price_repost_ton: Option<String>,
    pub price_story_ton: Option<String>,
    pub formats_enabled: Vec<String>,
}

impl ChannelService {
    pub fn new(db: DbPool, bot: Arc<dyn BotApi>) -> Self {
        Self { db, bot }
    }

    /// Registers a channel and seats the creator as its owner. The bot must
    /// still be invited before the channel can go live.
    pub async fn create_channel(
        &self,
        raw_username: &str,
        creator_user_id: &str,
    ) -> Result<Channel, ApiError> {
        let username = normalize_username(raw_username);
        if username.is_empty() {
            return Err(ApiError::validation("username is required"));
        }

        let creator = creator_user_id.to_string();
        let channel = with_conn(&self.db, move |conn| {
            let channel = Channel::create(conn, &NewChannel::pending(&username, &creator))?;
            ChannelMember::add(
                conn,
                &NewChannelMember::new(&channel.id, &creator, ROLE_OWNER, false),
            )?;
            let entry = NewAuditEntry::new(
                Some(&creator),
                ACTOR_USER,
                "channel_created",
                "channel",
                Some(&channel.id),
                Some(json!({ "username": channel.username })),
            );
            let _ = AuditEntry::append(conn, &entry);
            Ok(channel)
        })
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::Conflict("channel handle already registered".to_string()),
            other => other,
        })?;

        info!(channel_id = %channel.id, username = %channel.username, "channel registered");
        Ok(channel)
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Channel, ApiError> {
        let id = channel_id.to_string();
        with_conn(&self.db, move |conn| Channel::find(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("channel"),
                other => other,
            })
    }

    pub async fn my_channels(&self, user_id: &str) -> Result<Vec<Channel>, ApiError> {
        let user = user_id.to_string();
        with_conn(&self.db, move |conn| Channel::by_member(conn, &user)).await
    }

    pub async fn search(&self, filter: ChannelFilter) -> Result<Vec<Channel>, ApiError> {
        with_conn(&self.db, move |conn| Channel::search(conn, &filter)).await
    }

    pub async fn bot_invite_link(&self, channel_id: &str) -> Result<String, ApiError> {
        let channel = self.get_channel(channel_id).await?;
        Ok(format!(
            "Add the bot as an administrator of @{} with the 'Post Messages' permission.",
            channel.username
        ))
    }

    /// Owner-only. The candidate must already be a Telegram admin of the
    /// channel; membership is capped at one owner plus two managers.
    pub async fn add_manager(
        &self,
        channel_id: &str,
        actor_id: &str,
        manager_telegram_id: i64,
    ) -> Result<ChannelMember, ApiError> {
        let (channel_owned, actor_owned) = (channel_id.to_string(), actor_id.to_string());
        let member = with_conn(&self.db, move |conn| {
            ChannelMember::find(conn, &channel_owned, &actor_owned).optional()
        })
        .await?;
        if member.map(|m| m.role) != Some(ROLE_OWNER.to_string()) {
            return Err(ApiError::Forbidden("only the owner can add managers".to_string()));
        }

        let channel_owned = channel_id.to_string();
        let count = with_conn(&self.db, move |conn| {
            ChannelMember::count_for_channel(conn, &channel_owned)
        })
        .await?;
        if count >= MAX_CHANNEL_MEMBERS {
            return Err(ApiError::Conflict(
                "maximum 3 members (owner + 2 managers) allowed".to_string(),
            ));
        }

        let channel = self.get_channel(channel_id).await?;
        let check = self
            .bot
            .check_admin(&channel.username, manager_telegram_id)
            .await
            .map_err(|e| ApiError::Upstream(format!("failed to verify admin: {e}")))?;
        if !check.is_admin {
            return Err(ApiError::validation(format!(
                "user {manager_telegram_id} is not an admin of channel @{}",
                channel.username
            )));
        }

        let channel_owned = channel_id.to_string();
        with_conn(&self.db, move |conn| {
            let manager = User::upsert_by_telegram_id(conn, manager_telegram_id, None, None, None)?;
            ChannelMember::add(
                conn,
                &NewChannelMember::new(&channel_owned, &manager.id, ROLE_MANAGER, check.can_post_messages),
            )
        })
        .await
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::Conflict("user is already a member".to_string()),
            other => other,
        })
    }

    pub async fn members(&self, channel_id: &str) -> Result<Vec<ChannelMember>, ApiError> {
        let id = channel_id.to_string();
        with_conn(&self.db, move |conn| ChannelMember::for_channel(conn, &id)).await
    }

    pub async fn admins(&self, channel_id: &str) -> Result<Vec<AdminInfo>, ApiError> {
        let channel = self.get_channel(channel_id).await?;
        self.bot
            .get_admins(&channel.username)
            .await
            .map_err(|e| ApiError::Upstream(format!("failed to fetch admins: {e}")))
    }

    pub async fn upsert_listing(
        &self,
        channel_id: &str,
        actor_id: &str,
        update: ListingUpdate,
    ) -> Result<ChannelListing, ApiError> {
        let (channel_owned, actor_owned) = (channel_id.to_string(), actor_id.to_string());
        with_conn(&self.db, move |conn| {
            ChannelMember::find(conn, &channel_owned, &actor_owned).optional()
        })
        .await?
        .ok_or_else(|| ApiError::Forbidden("user is not a member of this channel".to_string()))?;

        for format in &update.formats_enabled {
            if !crate::models::deal::is_valid_ad_format(format) {
                return Err(ApiError::validation(format!("unknown ad format {format:?}")));
            }
        }
        for price in [
            update.price_post_ton.as_deref(),
            update.price_repost_ton.as_deref(),
            update.price_story_ton.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            parse_ton_to_nano(price)
                .map_err(|e| ApiError::validation(format!("invalid price {price:?}: {e}")))?;
        }

        let channel_owned = channel_id.to_string();
        with_conn(&self.db, move |conn| {
            ChannelListing::upsert(conn, &channel_owned, &update)
        })
        .await
    }

    pub async fn get_listing(&self, channel_id: &str) -> Result<ChannelListing, ApiError> {
        let id = channel_id.to_string();
        with_conn(&self.db, move |conn| ChannelListing::get(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("listing"),
                other => other,
            })
    }

    pub async fn latest_stats(&self, channel_id: &str) -> Result<StatsSnapshot, ApiError> {
        let id = channel_id.to_string();
        with_conn(&self.db, move |conn| StatsSnapshot::latest(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("stats snapshot"),
                other => other,
            })
    }

    /// Channels with an active listing, enriched with offer and stats and
    /// narrowed by the explore filters.
    pub async fn explore(&self, filter: ExploreFilter) -> Result<Vec<ExploreChannel>, ApiError> {
        with_conn(&self.db, move |conn| {
            let channels = Channel::search(conn, &filter.channels)?;
            let mut cards = Vec::new();
            for channel in channels {
                let Some(listing) = ChannelListing::get(conn, &channel.id).optional()? else {
                    continue;
                };
                if listing.status != LISTING_ACTIVE {
                    continue;
                }
                if let Some(ref category) = filter.category {
                    if listing.category.as_deref() != Some(category.as_str()) {
                        continue;
                    }
                }
                if let Some(ref language) = filter.language {
                    if listing.language.as_deref() != Some(language.as_str()) {
                        continue;
                    }
                }
                let stats = StatsSnapshot::latest(conn, &channel.id).optional()?;
                if let Some(min) = filter.min_subscribers {
                    if stats.as_ref().and_then(|s| s.subscribers).unwrap_or(0) < min {
                        continue;
                    }
                }
                if let Some(min) = filter.min_avg_views {
                    if stats.as_ref().and_then(|s| s.avg_views).unwrap_or(0) < min {
                        continue;
                    }
                }
                cards.push(ExploreChannel {
                    id: channel.id,
                    username: channel.username,
                    title: channel.title,
                    subscribers: stats.as_ref().and_then(|s| s.subscribers),
                    avg_views: stats.as_ref().and_then(|s| s.avg_views),
                    er_percent: stats.as_ref().and_then(|s| s.er_percent),
                    category: listing.category.clone(),
                    language: listing.language.clone(),
                    price_post_ton: listing.price_post_ton.clone(),
                    price_repost_ton: listing.price_repost_ton.clone(),
                    price_story_ton: listing.price_story_ton.clone(),
                    formats_enabled: listing.formats(),
                });
            }
            Ok(cards)
        })
        .await
    }
}
