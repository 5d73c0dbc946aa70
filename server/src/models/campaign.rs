//! Advertiser campaigns: a lightweight grouping for briefs and budgets.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::campaigns;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = campaigns)]
pub struct Campaign {
    pub id: String,
    pub advertiser_user_id: String,
    pub title: String,
    pub target_audience: String,
    pub key_messages: Option<String>,
    pub budget_ton: String,
    pub preferred_date: Option<NaiveDateTime>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = campaigns)]
pub struct NewCampaign {
    pub id: String,
    pub advertiser_user_id: String,
    pub title: String,
    pub target_audience: String,
    pub key_messages: Option<String>,
    pub budget_ton: String,
    pub preferred_date: Option<NaiveDateTime>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Campaign {
    pub fn create(conn: &mut SqliteConnection, new_campaign: &NewCampaign) -> QueryResult<Campaign> {
        diesel::insert_into(campaigns::table)
            .values(new_campaign)
            .execute(conn)?;
        campaigns::table.find(&new_campaign.id).first(conn)
    }

    pub fn find(conn: &mut SqliteConnection, campaign_id: &str) -> QueryResult<Campaign> {
        campaigns::table.find(campaign_id).first(conn)
    }

    pub fn list_for_advertiser(
        conn: &mut SqliteConnection,
        advertiser_user_id: &str,
        limit: i64,
        offset: i64,
    ) -> QueryResult<Vec<Campaign>> {
        let limit = if limit <= 0 || limit > 100 { 20 } else { limit };
        campaigns::table
            .filter(campaigns::advertiser_user_id.eq(advertiser_user_id))
            .order(campaigns::created_at.desc())
            .limit(limit)
            .offset(offset.max(0))
            .load(conn)
    }

    pub fn update_fields(
        conn: &mut SqliteConnection,
        campaign_id: &str,
        title: &str,
        target_audience: &str,
        key_messages: Option<&str>,
        budget_ton: &str,
        preferred_date: Option<NaiveDateTime>,
        status: &str,
    ) -> QueryResult<usize> {
        diesel::update(campaigns::table.find(campaign_id))
            .set((
                campaigns::title.eq(title),
                campaigns::target_audience.eq(target_audience),
                campaigns::key_messages.eq(key_messages),
                campaigns::budget_ton.eq(budget_ton),
                campaigns::preferred_date.eq(preferred_date),
                campaigns::status.eq(status),
                campaigns::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
    }

    pub fn delete(conn: &mut SqliteConnection, campaign_id: &str) -> QueryResult<usize> {
        diesel::delete(campaigns::table.find(campaign_id)).execute(conn)
    }
}

impl NewCampaign {
    pub fn active(advertiser_user_id: &str, title: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            advertiser_user_id: advertiser_user_id.to_string(),
            title: title.to_string(),
            target_audience: String::new(),
            key_messages: None,
            budget_ton: "0".to_string(),
            preferred_date: None,
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
