//! Deal model and the fixed status machine.
//!
//! A deal walks `draft → submitted → accepted → awaiting_payment → funded →
//! creative loop → posted → hold_verification → completed` with rejection,
//! cancellation and refund side exits. Anything not in the transition table
//! is rejected; `rejected`, `completed` and `refunded` are terminal.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::post::DealPost;
use crate::schema::{channel_members, channels, deal_posts, deals};

pub const DEAL_DRAFT: &str = "draft";
pub const DEAL_SUBMITTED: &str = "submitted";
pub const DEAL_REJECTED: &str = "rejected";
pub const DEAL_ACCEPTED: &str = "accepted";
pub const DEAL_AWAITING_PAYMENT: &str = "awaiting_payment";
pub const DEAL_FUNDED: &str = "funded";
pub const DEAL_CREATIVE_PENDING: &str = "creative_pending";
pub const DEAL_CREATIVE_SUBMITTED: &str = "creative_submitted";
pub const DEAL_CREATIVE_CHANGES_REQUESTED: &str = "creative_changes_requested";
pub const DEAL_CREATIVE_APPROVED: &str = "creative_approved";
pub const DEAL_SCHEDULED: &str = "scheduled";
pub const DEAL_POSTED: &str = "posted";
pub const DEAL_HOLD_VERIFICATION: &str = "hold_verification";
pub const DEAL_HOLD_VERIFICATION_FAILED: &str = "hold_verification_failed";
pub const DEAL_COMPLETED: &str = "completed";
pub const DEAL_REFUNDED: &str = "refunded";
pub const DEAL_CANCELLED: &str = "cancelled";

pub const ALL_DEAL_STATUSES: [&str; 17] = [
    DEAL_DRAFT,
    DEAL_SUBMITTED,
    DEAL_REJECTED,
    DEAL_ACCEPTED,
    DEAL_AWAITING_PAYMENT,
    DEAL_FUNDED,
    DEAL_CREATIVE_PENDING,
    DEAL_CREATIVE_SUBMITTED,
    DEAL_CREATIVE_CHANGES_REQUESTED,
    DEAL_CREATIVE_APPROVED,
    DEAL_SCHEDULED,
    DEAL_POSTED,
    DEAL_HOLD_VERIFICATION,
    DEAL_HOLD_VERIFICATION_FAILED,
    DEAL_COMPLETED,
    DEAL_REFUNDED,
    DEAL_CANCELLED,
];

pub const AD_FORMAT_POST: &str = "post";
pub const AD_FORMAT_REPOST: &str = "repost";
pub const AD_FORMAT_STORY: &str = "story";
pub const ALL_AD_FORMATS: [&str; 3] = [AD_FORMAT_POST, AD_FORMAT_REPOST, AD_FORMAT_STORY];

pub fn is_valid_ad_format(format: &str) -> bool {
    ALL_AD_FORMATS.contains(&format)
}

/// Permitted follow-up statuses for each deal status.
pub fn allowed_transitions(from: &str) -> &'static [&'static str] {
    match from {
        DEAL_DRAFT => &[DEAL_SUBMITTED, DEAL_CANCELLED],
        DEAL_SUBMITTED => &[DEAL_ACCEPTED, DEAL_REJECTED, DEAL_CANCELLED],
        DEAL_REJECTED => &[],
        DEAL_ACCEPTED => &[DEAL_AWAITING_PAYMENT, DEAL_CANCELLED],
        DEAL_AWAITING_PAYMENT => &[DEAL_FUNDED, DEAL_CANCELLED],
        DEAL_FUNDED => &[DEAL_CREATIVE_PENDING, DEAL_CANCELLED],
        DEAL_CREATIVE_PENDING => &[DEAL_CREATIVE_SUBMITTED, DEAL_CANCELLED],
        DEAL_CREATIVE_SUBMITTED => &[DEAL_CREATIVE_APPROVED, DEAL_CREATIVE_CHANGES_REQUESTED],
        DEAL_CREATIVE_CHANGES_REQUESTED => &[DEAL_CREATIVE_SUBMITTED, DEAL_CANCELLED],
        DEAL_CREATIVE_APPROVED => &[DEAL_SCHEDULED, DEAL_POSTED],
        DEAL_SCHEDULED => &[DEAL_POSTED, DEAL_CANCELLED],
        DEAL_POSTED => &[DEAL_HOLD_VERIFICATION],
        DEAL_HOLD_VERIFICATION => &[DEAL_COMPLETED, DEAL_HOLD_VERIFICATION_FAILED],
        DEAL_HOLD_VERIFICATION_FAILED => &[DEAL_REFUNDED],
        DEAL_COMPLETED => &[],
        DEAL_REFUNDED => &[],
        DEAL_CANCELLED => &[DEAL_REFUNDED],
        _ => &[],
    }
}

pub fn is_valid_transition(from: &str, to: &str) -> bool {
    allowed_transitions(from).contains(&to)
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = deals)]
pub struct Deal {
    pub id: String,
    pub channel_id: String,
    pub advertiser_user_id: String,
    pub status: String,
    pub ad_format: String,
    pub brief: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub price_ton: String,
    pub platform_fee_bps: i32,
    pub hold_period_seconds: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = deals)]
pub struct NewDeal {
    pub id: String,
    pub channel_id: String,
    pub advertiser_user_id: String,
    pub status: String,
    pub ad_format: String,
    pub brief: Option<String>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub price_ton: String,
    pub platform_fee_bps: i32,
    pub hold_period_seconds: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewDeal {
    pub fn draft(
        channel_id: &str,
        advertiser_user_id: &str,
        ad_format: &str,
        price_ton: &str,
        platform_fee_bps: i32,
        hold_period_seconds: i32,
    ) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            channel_id: channel_id.to_string(),
            advertiser_user_id: advertiser_user_id.to_string(),
            status: DEAL_DRAFT.to_string(),
            ad_format: ad_format.to_string(),
            brief: None,
            scheduled_at: None,
            price_ton: price_ton.to_string(),
            platform_fee_bps,
            hold_period_seconds,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Deal plus channel display fields, joined to avoid N+1 lookups in lists.
#[derive(Debug, Clone, Serialize)]
pub struct DealWithChannel {
    #[serde(flatten)]
    pub deal: Deal,
    pub channel_title: Option<String>,
    pub channel_username: String,
}

#[derive(Debug, Default, Clone)]
pub struct DealFilter {
    pub channel_id: Option<String>,
    pub advertiser_user_id: Option<String>,
    /// Deals on any channel this user is a member of.
    pub member_user_id: Option<String>,
    pub status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Deal {
    pub fn create(conn: &mut SqliteConnection, new_deal: &NewDeal) -> QueryResult<Deal> {
        diesel::insert_into(deals::table)
            .values(new_deal)
            .execute(conn)?;
        deals::table.find(&new_deal.id).first(conn)
    }

    pub fn find(conn: &mut SqliteConnection, deal_id: &str) -> QueryResult<Deal> {
        deals::table.find(deal_id).first(conn)
    }

    pub fn find_with_channel(
        conn: &mut SqliteConnection,
        deal_id: &str,
    ) -> QueryResult<DealWithChannel> {
        let (deal, channel_title, channel_username) = deals::table
            .inner_join(channels::table)
            .filter(deals::id.eq(deal_id))
            .select((deals::all_columns, channels::title, channels::username))
            .first::<(Deal, Option<String>, String)>(conn)?;
        Ok(DealWithChannel {
            deal,
            channel_title,
            channel_username,
        })
    }

    pub fn list_with_channel(
        conn: &mut SqliteConnection,
        filter: &DealFilter,
    ) -> QueryResult<Vec<DealWithChannel>> {
        let mut query = deals::table
            .inner_join(channels::table)
            .select((deals::all_columns, channels::title, channels::username))
            .into_boxed();

        if let Some(ref channel_id) = filter.channel_id {
            query = query.filter(deals::channel_id.eq(channel_id.clone()));
        }
        if let Some(ref advertiser) = filter.advertiser_user_id {
            query = query.filter(deals::advertiser_user_id.eq(advertiser.clone()));
        }
        if let Some(ref member) = filter.member_user_id {
            let member_channels = channel_members::table
                .filter(channel_members::user_id.eq(member.clone()))
                .select(channel_members::channel_id);
            query = query.filter(deals::channel_id.eq_any(member_channels));
        }
        if let Some(ref status) = filter.status {
            query = query.filter(deals::status.eq(status.clone()));
        }

        let limit = match filter.limit {
            n if n <= 0 || n > 100 => 20,
            n => n,
        };

        let rows = query
            .order(deals::created_at.desc())
            .limit(limit)
            .offset(filter.offset.max(0))
            .load::<(Deal, Option<String>, String)>(conn)?;

        Ok(rows
            .into_iter()
            .map(|(deal, channel_title, channel_username)| DealWithChannel {
                deal,
                channel_title,
                channel_username,
            })
            .collect())
    }

    /// Single-statement status update; `updated_at` always moves with it.
    pub fn update_status(
        conn: &mut SqliteConnection,
        deal_id: &str,
        new_status: &str,
    ) -> QueryResult<usize> {
        diesel::update(deals::table.find(deal_id))
            .set((
                deals::status.eq(new_status),
                deals::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
    }

    pub fn update_scheduled_at(
        conn: &mut SqliteConnection,
        deal_id: &str,
        scheduled_at: Option<NaiveDateTime>,
    ) -> QueryResult<usize> {
        diesel::update(deals::table.find(deal_id))
            .set((
                deals::scheduled_at.eq(scheduled_at),
                deals::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
    }

    /// Deals stuck in `status` for longer than `timeout_seconds`.
    pub fn timed_out(
        conn: &mut SqliteConnection,
        status: &str,
        timeout_seconds: i64,
    ) -> QueryResult<Vec<Deal>> {
        let cutoff = Utc::now().naive_utc() - chrono::Duration::seconds(timeout_seconds);
        deals::table
            .filter(deals::status.eq(status))
            .filter(deals::updated_at.lt(cutoff))
            .load(conn)
    }

    /// Deals in hold verification together with their placement post.
    /// Hold-period elapse is evaluated by the caller since it depends on
    /// per-deal `hold_period_seconds`.
    pub fn in_hold_with_posts(conn: &mut SqliteConnection) -> QueryResult<Vec<(Deal, DealPost)>> {
        deals::table
            .inner_join(deal_posts::table)
            .filter(deals::status.eq(DEAL_HOLD_VERIFICATION))
            .select((deals::all_columns, deal_posts::all_columns))
            .load(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        let cases = [
            // Forward path
            (DEAL_DRAFT, DEAL_SUBMITTED, true),
            (DEAL_SUBMITTED, DEAL_ACCEPTED, true),
            (DEAL_SUBMITTED, DEAL_REJECTED, true),
            (DEAL_ACCEPTED, DEAL_AWAITING_PAYMENT, true),
            (DEAL_AWAITING_PAYMENT, DEAL_FUNDED, true),
            (DEAL_FUNDED, DEAL_CREATIVE_PENDING, true),
            (DEAL_CREATIVE_PENDING, DEAL_CREATIVE_SUBMITTED, true),
            (DEAL_CREATIVE_SUBMITTED, DEAL_CREATIVE_APPROVED, true),
            (DEAL_CREATIVE_SUBMITTED, DEAL_CREATIVE_CHANGES_REQUESTED, true),
            (DEAL_CREATIVE_CHANGES_REQUESTED, DEAL_CREATIVE_SUBMITTED, true),
            (DEAL_CREATIVE_APPROVED, DEAL_SCHEDULED, true),
            (DEAL_CREATIVE_APPROVED, DEAL_POSTED, true),
            (DEAL_SCHEDULED, DEAL_POSTED, true),
            (DEAL_POSTED, DEAL_HOLD_VERIFICATION, true),
            (DEAL_HOLD_VERIFICATION, DEAL_COMPLETED, true),
            (DEAL_HOLD_VERIFICATION, DEAL_HOLD_VERIFICATION_FAILED, true),
            (DEAL_HOLD_VERIFICATION_FAILED, DEAL_REFUNDED, true),
            // Cancellation paths
            (DEAL_DRAFT, DEAL_CANCELLED, true),
            (DEAL_SUBMITTED, DEAL_CANCELLED, true),
            (DEAL_ACCEPTED, DEAL_CANCELLED, true),
            (DEAL_AWAITING_PAYMENT, DEAL_CANCELLED, true),
            (DEAL_FUNDED, DEAL_CANCELLED, true),
            (DEAL_CREATIVE_PENDING, DEAL_CANCELLED, true),
            (DEAL_CREATIVE_CHANGES_REQUESTED, DEAL_CANCELLED, true),
            (DEAL_SCHEDULED, DEAL_CANCELLED, true),
            (DEAL_CANCELLED, DEAL_REFUNDED, true),
            // Not allowed
            (DEAL_DRAFT, DEAL_FUNDED, false),
            (DEAL_DRAFT, DEAL_POSTED, false),
            (DEAL_REJECTED, DEAL_ACCEPTED, false),
            (DEAL_COMPLETED, DEAL_REFUNDED, false),
            (DEAL_REFUNDED, DEAL_COMPLETED, false),
            (DEAL_POSTED, DEAL_CANCELLED, false),
            (DEAL_HOLD_VERIFICATION, DEAL_CANCELLED, false),
            (DEAL_COMPLETED, DEAL_CANCELLED, false),
            (DEAL_CREATIVE_SUBMITTED, DEAL_CREATIVE_PENDING, false),
            ("nonexistent", DEAL_SUBMITTED, false),
            (DEAL_DRAFT, "nonexistent", false),
        ];

        for (from, to, expected) in cases {
            assert_eq!(
                is_valid_transition(from, to),
                expected,
                "transition {from} -> {to}"
            );
        }
    }

    #[test]
    fn transition_closure_over_all_statuses() {
        // Every (from, to) pair not in the table must be rejected and every
        // listed pair accepted; derived directly from allowed_transitions.
        for from in ALL_DEAL_STATUSES {
            for to in ALL_DEAL_STATUSES {
                let listed = allowed_transitions(from).contains(&to);
                assert_eq!(is_valid_transition(from, to), listed);
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for status in [DEAL_REJECTED, DEAL_COMPLETED, DEAL_REFUNDED] {
            assert!(
                allowed_transitions(status).is_empty(),
                "{status} must be terminal"
            );
        }
    }

    #[test]
    fn ad_format_validation() {
        assert!(is_valid_ad_format("post"));
        assert!(is_valid_ad_format("repost"));
        assert!(is_valid_ad_format("story"));
        assert!(!is_valid_ad_format("banner"));
        assert!(!is_valid_ad_format(""));
    }
}
