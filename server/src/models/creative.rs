//! Creative versions: append-only history per deal, version 1..N.
//!
//! The unique `(deal_id, version)` index serializes concurrent submitters;
//! the losing writer re-reads the max version and retries.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::deal_creatives;

pub const CREATIVE_PENDING: &str = "pending";
pub const CREATIVE_SUBMITTED: &str = "submitted";
pub const CREATIVE_CHANGES_REQUESTED: &str = "changes_requested";
pub const CREATIVE_APPROVED: &str = "approved";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = deal_creatives)]
pub struct DealCreative {
    pub id: String,
    pub deal_id: String,
    pub version: i32,
    pub owner_composed_text: Option<String>,
    pub advertiser_materials_text: Option<String>,
    pub status: String,
    pub repost_from_chat_id: Option<i64>,
    pub repost_from_msg_id: Option<i64>,
    pub repost_from_url: Option<String>,
    pub media_urls: Option<String>,
    pub buttons_json: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = deal_creatives)]
pub struct NewCreative {
    pub id: String,
    pub deal_id: String,
    pub version: i32,
    pub owner_composed_text: Option<String>,
    pub advertiser_materials_text: Option<String>,
    pub status: String,
    pub repost_from_chat_id: Option<i64>,
    pub repost_from_msg_id: Option<i64>,
    pub repost_from_url: Option<String>,
    pub media_urls: Option<String>,
    pub buttons_json: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewCreative {
    pub fn submitted(deal_id: &str, version: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            deal_id: deal_id.to_string(),
            version,
            owner_composed_text: None,
            advertiser_materials_text: None,
            status: CREATIVE_SUBMITTED.to_string(),
            repost_from_chat_id: None,
            repost_from_msg_id: None,
            repost_from_url: None,
            media_urls: None,
            buttons_json: None,
            created_at: Utc::now().naive_utc(),
        }
    }
}

impl DealCreative {
    pub fn create(conn: &mut SqliteConnection, new_creative: &NewCreative) -> QueryResult<DealCreative> {
        diesel::insert_into(deal_creatives::table)
            .values(new_creative)
            .execute(conn)?;
        deal_creatives::table.find(&new_creative.id).first(conn)
    }

    pub fn max_version(conn: &mut SqliteConnection, deal_id: &str) -> QueryResult<i32> {
        use diesel::dsl::max;
        let v: Option<i32> = deal_creatives::table
            .filter(deal_creatives::deal_id.eq(deal_id))
            .select(max(deal_creatives::version))
            .first(conn)?;
        Ok(v.unwrap_or(0))
    }

    pub fn latest(conn: &mut SqliteConnection, deal_id: &str) -> QueryResult<DealCreative> {
        deal_creatives::table
            .filter(deal_creatives::deal_id.eq(deal_id))
            .order(deal_creatives::version.desc())
            .first(conn)
    }

    pub fn update_status(
        conn: &mut SqliteConnection,
        creative_id: &str,
        new_status: &str,
    ) -> QueryResult<usize> {
        diesel::update(deal_creatives::table.find(creative_id))
            .set(deal_creatives::status.eq(new_status))
            .execute(conn)
    }
}
