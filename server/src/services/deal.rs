//! Deal orchestration: validated status transitions, role-gated actions,
//! creative versioning and escrow minting.
//!
//! Every successful transition updates the deal row atomically, appends a
//! `deal_status_<from>_to_<to>` audit entry and publishes a
//! `deal_status_changed` event. Event publication is best-effort; the audit
//! log is the durable record.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use diesel::OptionalExtension;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::events::{Event, Publisher, EVENT_BOT_NOTIFICATION, EVENT_DEAL_STATUS_CHANGED, TOPIC_BOT, TOPIC_DEAL};
use crate::models::audit::{ACTOR_SYSTEM, ACTOR_USER};
use crate::models::creative::{CREATIVE_APPROVED, CREATIVE_CHANGES_REQUESTED};
use crate::models::deal::{
    is_valid_ad_format, is_valid_transition, DEAL_AWAITING_PAYMENT, DEAL_CANCELLED,
    DEAL_COMPLETED, DEAL_CREATIVE_APPROVED, DEAL_CREATIVE_CHANGES_REQUESTED,
    DEAL_CREATIVE_PENDING, DEAL_CREATIVE_SUBMITTED, DEAL_FUNDED, DEAL_HOLD_VERIFICATION,
    DEAL_HOLD_VERIFICATION_FAILED, DEAL_POSTED, DEAL_REFUNDED, DEAL_REJECTED, DEAL_SCHEDULED,
    DEAL_SUBMITTED,
};
use crate::models::escrow::TX_REF_PENDING_SEND;
use crate::models::listing::LISTING_ACTIVE;
use crate::models::{
    AuditEntry, ChannelListing, ChannelMember, Deal, DealCreative, DealFilter, DealPost,
    DealWithChannel, EscrowLedger, NewAuditEntry, NewCreative, NewDeal, NewEscrow, PostPatch,
    UserWallet, WithdrawWallet,
};
use crate::ton::parse_ton_to_nano;

/// Creative payload as submitted by a channel member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreativeInput {
    #[serde(default)]
    pub text: String,
    pub repost_from_url: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub buttons_json: Option<serde_json::Value>,
}

/// Who is acting, and under which HTTP request.
///
/// The request correlation id travels with the actor into the audit trail
/// and the `deal_status_changed` payload, so a support engineer can walk
/// from an access-log line straight to the transitions it caused. Worker
/// and indexer calls act without a request id.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub request_id: Option<String>,
}

impl Actor {
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            request_id: None,
        }
    }

    pub fn with_request(user_id: &str, request_id: Option<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            request_id,
        }
    }
}

impl From<&str> for Actor {
    fn from(user_id: &str) -> Self {
        Actor::user(user_id)
    }
}

impl From<&String> for Actor {
    fn from(user_id: &String) -> Self {
        Actor::user(user_id)
    }
}

impl From<&Actor> for Actor {
    fn from(actor: &Actor) -> Self {
        actor.clone()
    }
}

pub struct DealService {
    db: DbPool,
    publisher: Arc<dyn Publisher>,
    hot_wallet_address: String,
    platform_fee_bps: i32,
    default_hold_period_seconds: i32,
}

impl DealService {
    pub fn new(
        db: DbPool,
        publisher: Arc<dyn Publisher>,
        hot_wallet_address: String,
        platform_fee_bps: i32,
        default_hold_period_seconds: i32,
    ) -> Self {
        Self {
            db,
            publisher,
            hot_wallet_address,
            platform_fee_bps,
            default_hold_period_seconds,
        }
    }

    // ------------------------------------------------------------------
    // Transition plumbing
    // ------------------------------------------------------------------

    /// Validates and performs one status transition with audit logging.
    /// `deal.status` is updated in place on success.
    async fn transition(
        &self,
        deal: &mut Deal,
        new_status: &'static str,
        actor: Option<&Actor>,
        actor_type: &'static str,
    ) -> Result<(), ApiError> {
        let old_status = deal.status.clone();
        if !is_valid_transition(&old_status, new_status) {
            return Err(ApiError::invalid_transition(&old_status, new_status));
        }

        let actor_user_id = actor.map(|a| a.user_id.clone());
        let request_id = actor.and_then(|a| a.request_id.clone());

        let mut meta = json!({ "old_status": old_status, "new_status": new_status });
        if let Some(ref rid) = request_id {
            meta["request_id"] = json!(rid);
        }

        let deal_id = deal.id.clone();
        let old_for_db = old_status.clone();
        with_conn(&self.db, move |conn| {
            Deal::update_status(conn, &deal_id, new_status)?;
            let entry = NewAuditEntry::new(
                actor_user_id.as_deref(),
                actor_type,
                &format!("deal_status_{old_for_db}_to_{new_status}"),
                "deal",
                Some(&deal_id),
                Some(meta),
            );
            // Auditing shares the statement's connection but not its fate:
            // the status write has already landed.
            if let Err(e) = AuditEntry::append(conn, &entry) {
                tracing::error!(deal_id = %entry.entity_id.as_deref().unwrap_or(""), error = %e, "audit append failed");
            }
            Ok(())
        })
        .await?;

        deal.status = new_status.to_string();

        let mut payload = json!({
            "deal_id": deal.id,
            "old_status": old_status,
            "new_status": new_status,
        });
        if let Some(ref rid) = request_id {
            payload["request_id"] = json!(rid);
        }
        self.publish_deal_event(EVENT_DEAL_STATUS_CHANGED, payload).await;

        info!(deal_id = %deal.id, from = %old_status, to = %new_status, "deal transitioned");
        Ok(())
    }

    async fn publish_deal_event(&self, event_type: &str, payload: serde_json::Value) {
        if let Err(e) = self
            .publisher
            .publish(TOPIC_DEAL, Event::new(event_type, payload))
            .await
        {
            warn!(event = %event_type, error = %e, "event publish failed");
        }
    }

    async fn notify_bot(&self, text: String, deal_id: &str) {
        let event = Event::new(
            EVENT_BOT_NOTIFICATION,
            json!({ "deal_id": deal_id, "text": text }),
        );
        if let Err(e) = self.publisher.publish(TOPIC_BOT, event).await {
            warn!(deal_id = %deal_id, error = %e, "bot notification publish failed");
        }
    }

    async fn load_deal(&self, deal_id: &str) -> Result<Deal, ApiError> {
        let id = deal_id.to_string();
        with_conn(&self.db, move |conn| Deal::find(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("deal"),
                other => other,
            })
    }

    /// The actor must be an owner or manager of the deal's channel.
    async fn check_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
        owner_only: bool,
    ) -> Result<ChannelMember, ApiError> {
        let (channel_id, user_id) = (channel_id.to_string(), user_id.to_string());
        let member = with_conn(&self.db, move |conn| {
            ChannelMember::find(conn, &channel_id, &user_id).optional()
        })
        .await?
        .ok_or_else(|| ApiError::Forbidden("user is not a member of this channel".to_string()))?;

        if owner_only && member.role != crate::models::channel::ROLE_OWNER {
            return Err(ApiError::Forbidden(
                "only the channel owner can perform this action".to_string(),
            ));
        }
        Ok(member)
    }

    // ------------------------------------------------------------------
    // Deal lifecycle
    // ------------------------------------------------------------------

    pub async fn create_deal(
        &self,
        advertiser: impl Into<Actor>,
        channel_id: &str,
        ad_format: &str,
        brief: Option<String>,
        price_ton: &str,
        scheduled_at: Option<NaiveDateTime>,
    ) -> Result<Deal, ApiError> {
        let advertiser = advertiser.into();
        if !is_valid_ad_format(ad_format) {
            return Err(ApiError::validation(format!(
                "invalid ad format {ad_format:?}, must be one of: post, repost, story"
            )));
        }

        let channel_id_owned = channel_id.to_string();
        let listing = with_conn(&self.db, move |conn| {
            ChannelListing::get(conn, &channel_id_owned).optional()
        })
        .await?
        .ok_or_else(|| ApiError::validation("channel has no listing"))?;

        if listing.status != LISTING_ACTIVE {
            return Err(ApiError::validation("channel listing is not active"));
        }
        if !listing.is_format_enabled(ad_format) {
            return Err(ApiError::validation(format!(
                "ad format {ad_format:?} is not enabled for this channel (available: {:?})",
                listing.formats()
            )));
        }

        // Empty or zero hint falls back to the listing's per-format price.
        let price_ton = if price_ton.is_empty() || price_ton == "0" {
            listing
                .price_for_format(ad_format)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ApiError::validation(format!(
                        "no price set for format {ad_format:?} in channel listing"
                    ))
                })?
                .to_string()
        } else {
            price_ton.to_string()
        };
        parse_ton_to_nano(&price_ton)
            .map_err(|e| ApiError::validation(format!("invalid price: {e}")))?;

        let mut hold_period_seconds = listing.hold_hours_for_format(ad_format) * 3600;
        if hold_period_seconds <= 0 {
            hold_period_seconds = self.default_hold_period_seconds;
        }

        let mut new_deal = NewDeal::draft(
            channel_id,
            &advertiser.user_id,
            ad_format,
            &price_ton,
            self.platform_fee_bps,
            hold_period_seconds,
        );
        new_deal.brief = brief;
        new_deal.scheduled_at = scheduled_at;

        let mut meta = json!({ "ad_format": ad_format, "price_ton": price_ton });
        if let Some(ref rid) = advertiser.request_id {
            meta["request_id"] = json!(rid);
        }
        let deal = with_conn(&self.db, move |conn| {
            let deal = Deal::create(conn, &new_deal)?;
            let entry = NewAuditEntry::new(
                Some(&advertiser.user_id),
                ACTOR_USER,
                "deal_created",
                "deal",
                Some(&deal.id),
                Some(meta),
            );
            let _ = AuditEntry::append(conn, &entry);
            Ok(deal)
        })
        .await?;

        info!(deal_id = %deal.id, channel_id = %channel_id, ad_format = %ad_format, "deal created");
        Ok(deal)
    }

    pub async fn submit_deal(&self, deal_id: &str, actor: impl Into<Actor>) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        if deal.advertiser_user_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "only the advertiser can submit the deal".to_string(),
            ));
        }
        self.transition(&mut deal, DEAL_SUBMITTED, Some(&actor), ACTOR_USER)
            .await
    }

    /// Accept runs two sequenced transitions (`submitted → accepted →
    /// awaiting_payment`) and mints the escrow record for the deposit.
    pub async fn accept_deal(&self, deal_id: &str, actor: impl Into<Actor>) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        self.check_channel_member(&deal.channel_id, &actor.user_id, false)
            .await?;

        self.transition(&mut deal, crate::models::deal::DEAL_ACCEPTED, Some(&actor), ACTOR_USER)
            .await?;
        self.transition(&mut deal, DEAL_AWAITING_PAYMENT, Some(&actor), ACTOR_SYSTEM)
            .await?;

        let new_escrow = NewEscrow::awaiting(&deal.id, &deal.price_ton, &self.hot_wallet_address);
        let memo = new_escrow.deposit_memo.clone();
        with_conn(&self.db, move |conn| {
            EscrowLedger::create(conn, &new_escrow).map(|_| ())
        })
        .await?;

        self.notify_bot(
            format!(
                "Deal accepted. Send {} TON to {} with memo {memo}",
                deal.price_ton, self.hot_wallet_address
            ),
            &deal.id,
        )
        .await;

        Ok(())
    }

    pub async fn reject_deal(&self, deal_id: &str, actor: impl Into<Actor>) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        self.check_channel_member(&deal.channel_id, &actor.user_id, false)
            .await?;
        self.transition(&mut deal, DEAL_REJECTED, Some(&actor), ACTOR_USER)
            .await
    }

    /// Allowed to the advertiser or any channel member, from every status
    /// whose transition table lists `cancelled`.
    pub async fn cancel_deal(&self, deal_id: &str, actor: impl Into<Actor>) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        if deal.advertiser_user_id != actor.user_id {
            self.check_channel_member(&deal.channel_id, &actor.user_id, false)
                .await
                .map_err(|_| {
                    ApiError::Forbidden(
                        "only the advertiser or a channel owner/manager can cancel".to_string(),
                    )
                })?;
        }
        self.transition(&mut deal, DEAL_CANCELLED, Some(&actor), ACTOR_USER)
            .await
    }

    // ------------------------------------------------------------------
    // Creatives
    // ------------------------------------------------------------------

    pub async fn submit_creative(
        &self,
        deal_id: &str,
        actor: impl Into<Actor>,
        input: CreativeInput,
    ) -> Result<DealCreative, ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        self.check_channel_member(&deal.channel_id, &actor.user_id, false)
            .await?;

        if deal.ad_format == crate::models::deal::AD_FORMAT_REPOST
            && input.repost_from_url.as_deref().unwrap_or("").is_empty()
        {
            return Err(ApiError::validation("repost format requires repost_from_url"));
        }

        if deal.status != DEAL_CREATIVE_PENDING && deal.status != DEAL_CREATIVE_CHANGES_REQUESTED {
            if deal.status == DEAL_FUNDED {
                self.transition(&mut deal, DEAL_CREATIVE_PENDING, Some(&actor), ACTOR_SYSTEM)
                    .await?;
            } else {
                return Err(ApiError::Conflict(format!(
                    "deal is not in a state that accepts creatives: {}",
                    deal.status
                )));
            }
        }

        let creative = self.append_creative_version(&deal.id, &input).await?;

        self.transition(&mut deal, DEAL_CREATIVE_SUBMITTED, Some(&actor), ACTOR_USER)
            .await?;

        Ok(creative)
    }

    /// Inserts `max(version)+1`; on a version-unique conflict (a concurrent
    /// submitter won the race) re-reads the max and retries once.
    async fn append_creative_version(
        &self,
        deal_id: &str,
        input: &CreativeInput,
    ) -> Result<DealCreative, ApiError> {
        for attempt in 0..2 {
            let deal_id_owned = deal_id.to_string();
            let input = input.clone();
            let result = with_conn(&self.db, move |conn| {
                let version = DealCreative::max_version(conn, &deal_id_owned)? + 1;
                let mut creative = NewCreative::submitted(&deal_id_owned, version);
                creative.owner_composed_text = Some(input.text.clone());
                creative.repost_from_url = input.repost_from_url.clone();
                if !input.media_urls.is_empty() {
                    creative.media_urls = serde_json::to_string(&input.media_urls).ok();
                }
                creative.buttons_json = input.buttons_json.as_ref().map(|b| b.to_string());
                DealCreative::create(conn, &creative)
            })
            .await;

            match result {
                Err(ApiError::Conflict(_)) if attempt == 0 => continue,
                other => return other,
            }
        }
        unreachable!("creative insert loop always returns");
    }

    pub async fn approve_creative(&self, deal_id: &str, actor: impl Into<Actor>) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        if deal.advertiser_user_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "only the advertiser can approve the creative".to_string(),
            ));
        }

        let deal_id_owned = deal.id.clone();
        with_conn(&self.db, move |conn| {
            let creative = DealCreative::latest(conn, &deal_id_owned)?;
            DealCreative::update_status(conn, &creative.id, CREATIVE_APPROVED)
        })
        .await?;

        self.transition(&mut deal, DEAL_CREATIVE_APPROVED, Some(&actor), ACTOR_USER)
            .await
    }

    pub async fn request_creative_changes(
        &self,
        deal_id: &str,
        actor: impl Into<Actor>,
        feedback: Option<String>,
    ) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        if deal.advertiser_user_id != actor.user_id {
            return Err(ApiError::Forbidden(
                "only the advertiser can request changes".to_string(),
            ));
        }

        let deal_id_owned = deal.id.clone();
        with_conn(&self.db, move |conn| {
            let creative = DealCreative::latest(conn, &deal_id_owned)?;
            DealCreative::update_status(conn, &creative.id, CREATIVE_CHANGES_REQUESTED)
        })
        .await?;

        self.transition(&mut deal, DEAL_CREATIVE_CHANGES_REQUESTED, Some(&actor), ACTOR_USER)
            .await?;

        if let Some(feedback) = feedback.filter(|f| !f.is_empty()) {
            let mut meta = json!({ "feedback": feedback });
            if let Some(ref rid) = actor.request_id {
                meta["request_id"] = json!(rid);
            }
            let deal_id_owned = deal.id.clone();
            with_conn(&self.db, move |conn| {
                let entry = NewAuditEntry::new(
                    Some(&actor.user_id),
                    ACTOR_USER,
                    "creative_changes_feedback",
                    "deal",
                    Some(&deal_id_owned),
                    Some(meta),
                );
                AuditEntry::append(conn, &entry)
            })
            .await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Posting & hold
    // ------------------------------------------------------------------

    pub async fn mark_manual_post(
        &self,
        deal_id: &str,
        actor: impl Into<Actor>,
        post_url: &str,
    ) -> Result<(), ApiError> {
        let actor = actor.into();
        let mut deal = self.load_deal(deal_id).await?;
        self.check_channel_member(&deal.channel_id, &actor.user_id, false)
            .await?;
        if post_url.trim().is_empty() {
            return Err(ApiError::validation("post_url is required"));
        }
        if deal.status != DEAL_CREATIVE_APPROVED && deal.status != DEAL_SCHEDULED {
            return Err(ApiError::Conflict(
                "deal must be creative_approved or scheduled to mark a post".to_string(),
            ));
        }

        let content_hash = hex::encode(Sha256::digest(post_url.as_bytes()));
        let patch = PostPatch {
            post_url: Some(post_url.to_string()),
            content_hash: Some(content_hash),
            posted_at: Some(Utc::now().naive_utc()),
            ..PostPatch::default()
        };
        let deal_id_owned = deal.id.clone();
        with_conn(&self.db, move |conn| {
            DealPost::upsert(conn, &deal_id_owned, &patch).map(|_| ())
        })
        .await?;

        self.transition(&mut deal, DEAL_POSTED, Some(&actor), ACTOR_USER)
            .await?;
        self.transition(&mut deal, DEAL_HOLD_VERIFICATION, Some(&actor), ACTOR_SYSTEM)
            .await
    }

    // ------------------------------------------------------------------
    // Finance
    // ------------------------------------------------------------------

    /// The withdraw destination must equal the owner's active verified
    /// wallet, in raw or friendly form; what is stored is the friendly form.
    pub async fn set_withdraw_wallet(
        &self,
        deal_id: &str,
        actor: impl Into<Actor>,
        wallet_address: &str,
    ) -> Result<WithdrawWallet, ApiError> {
        let actor = actor.into();
        let deal = self.load_deal(deal_id).await?;
        self.check_channel_member(&deal.channel_id, &actor.user_id, true)
            .await?;

        let wallet_owner = actor.user_id.clone();
        let user_wallet = with_conn(&self.db, move |conn| {
            UserWallet::active_for_user(conn, &wallet_owner).optional()
        })
        .await?
        .ok_or_else(|| {
            ApiError::validation("no verified wallet connected — connect your wallet first")
        })?;

        if !user_wallet.verified {
            return Err(ApiError::validation("connected wallet is not verified"));
        }
        if wallet_address != user_wallet.address && wallet_address != user_wallet.address_friendly {
            return Err(ApiError::validation(format!(
                "withdraw address must match your connected verified wallet ({})",
                user_wallet.address_friendly
            )));
        }

        let channel_id = deal.channel_id.clone();
        let owner = actor.user_id.clone();
        let address = user_wallet.address_friendly.clone();
        with_conn(&self.db, move |conn| {
            WithdrawWallet::upsert(conn, &channel_id, &owner, &address)
        })
        .await
    }

    // ------------------------------------------------------------------
    // System-actor settlement
    // ------------------------------------------------------------------

    /// Hold survived: complete the deal and mark the escrow released with a
    /// placeholder tx ref; the actual send belongs to the external signer.
    pub async fn release_funds(&self, deal_id: &str) -> Result<(), ApiError> {
        let mut deal = self.load_deal(deal_id).await?;
        if deal.status != DEAL_HOLD_VERIFICATION {
            return Err(ApiError::Conflict(format!(
                "deal is not in hold_verification: {}",
                deal.status
            )));
        }

        let deal_id_owned = deal.id.clone();
        let post = with_conn(&self.db, move |conn| {
            DealPost::find_by_deal(conn, &deal_id_owned)
        })
        .await?;

        if post.is_deleted {
            return self
                .transition(&mut deal, DEAL_HOLD_VERIFICATION_FAILED, None, ACTOR_SYSTEM)
                .await;
        }

        let release_amount = release_amount_after_fee(&deal.price_ton, deal.platform_fee_bps)
            .unwrap_or_else(|| deal.price_ton.clone());

        self.transition(&mut deal, DEAL_COMPLETED, None, ACTOR_SYSTEM)
            .await?;

        let deal_id_owned = deal.id.clone();
        let amount = release_amount.clone();
        let released = with_conn(&self.db, move |conn| {
            EscrowLedger::mark_released(conn, &deal_id_owned, &amount, TX_REF_PENDING_SEND)
        })
        .await?;
        if released == 0 {
            warn!(deal_id = %deal.id, "escrow was not in funded status at release time");
        }

        self.notify_bot(
            format!("Hold period complete, releasing {release_amount} TON"),
            &deal.id,
        )
        .await;

        Ok(())
    }

    /// Refund path. From `hold_verification` this walks through
    /// `hold_verification_failed` first; from `cancelled` it goes straight
    /// to `refunded`. The escrow row follows when one exists.
    pub async fn refund_deal(&self, deal_id: &str) -> Result<(), ApiError> {
        let mut deal = self.load_deal(deal_id).await?;

        if deal.status == DEAL_HOLD_VERIFICATION {
            self.transition(&mut deal, DEAL_HOLD_VERIFICATION_FAILED, None, ACTOR_SYSTEM)
                .await?;
        }
        self.transition(&mut deal, DEAL_REFUNDED, None, ACTOR_SYSTEM)
            .await?;

        let deal_id_owned = deal.id.clone();
        let refunded = with_conn(&self.db, move |conn| {
            match EscrowLedger::find_by_deal(conn, &deal_id_owned).optional()? {
                Some(_) => EscrowLedger::mark_refunded(conn, &deal_id_owned, TX_REF_PENDING_SEND),
                None => Ok(0),
            }
        })
        .await?;
        if refunded > 0 {
            info!(deal_id = %deal.id, "escrow marked refunded");
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_deal(&self, deal_id: &str) -> Result<DealWithChannel, ApiError> {
        let id = deal_id.to_string();
        with_conn(&self.db, move |conn| Deal::find_with_channel(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("deal"),
                other => other,
            })
    }

    pub async fn list_deals(&self, filter: DealFilter) -> Result<Vec<DealWithChannel>, ApiError> {
        with_conn(&self.db, move |conn| Deal::list_with_channel(conn, &filter)).await
    }

    pub async fn latest_creative(&self, deal_id: &str) -> Result<DealCreative, ApiError> {
        let id = deal_id.to_string();
        with_conn(&self.db, move |conn| DealCreative::latest(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("creative"),
                other => other,
            })
    }

    pub async fn deal_events(&self, deal_id: &str) -> Result<Vec<AuditEntry>, ApiError> {
        let id = deal_id.to_string();
        with_conn(&self.db, move |conn| {
            AuditEntry::by_entity(conn, "deal", &id, 100, 0)
        })
        .await
    }

    pub async fn payment_info(&self, deal_id: &str) -> Result<EscrowLedger, ApiError> {
        let id = deal_id.to_string();
        with_conn(&self.db, move |conn| EscrowLedger::find_by_deal(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("escrow"),
                other => other,
            })
    }
}

/// Net payout after the platform fee, computed in integer nanoTON.
fn release_amount_after_fee(price_ton: &str, fee_bps: i32) -> Option<String> {
    let gross = parse_ton_to_nano(price_ton).ok()?;
    let fee_bps = fee_bps.clamp(0, 10_000) as u128;
    let net = gross - gross * fee_bps / 10_000;
    Some(crate::ton::format_nano_as_ton(net))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ton::NANO_PER_TON;

    #[test]
    fn fee_is_deducted_in_nano_math() {
        // 3% of 5 TON = 0.15 TON
        assert_eq!(release_amount_after_fee("5", 300), Some("4.85".to_string()));
        assert_eq!(release_amount_after_fee("5", 0), Some("5".to_string()));
        assert_eq!(release_amount_after_fee("0.000000003", 300), Some("0.000000003".to_string()));
        assert_eq!(release_amount_after_fee("not-a-number", 300), None);
    }

    #[test]
    fn fee_bps_is_clamped() {
        assert_eq!(release_amount_after_fee("5", 20_000), Some("0".to_string()));
        assert_eq!(release_amount_after_fee("5", -5), Some("5".to_string()));
    }

    #[test]
    fn nano_constant_matches_shift() {
        assert_eq!(NANO_PER_TON, 10u128.pow(9));
    }
}
