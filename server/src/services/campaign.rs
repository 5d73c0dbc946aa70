//! Advertiser campaign CRUD, strictly scoped to the owning advertiser.
//! Campaigns belonging to someone else read as not-found, never forbidden.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::models::audit::ACTOR_USER;
use crate::models::{AuditEntry, Campaign, NewAuditEntry, NewCampaign};

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignInput {
    pub title: String,
    #[serde(default)]
    pub target_audience: String,
    pub key_messages: Option<String>,
    pub budget_ton: Option<String>,
    pub preferred_date: Option<NaiveDateTime>,
    pub status: Option<String>,
}

pub struct CampaignService {
    db: DbPool,
}

impl CampaignService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: &str, input: CampaignInput) -> Result<Campaign, ApiError> {
        if input.title.trim().is_empty() {
            return Err(ApiError::validation("title is required"));
        }

        let user_owned = user_id.to_string();
        with_conn(&self.db, move |conn| {
            let mut new_campaign = NewCampaign::active(&user_owned, input.title.trim());
            new_campaign.target_audience = input.target_audience.clone();
            new_campaign.key_messages = input.key_messages.clone();
            if let Some(budget) = &input.budget_ton {
                new_campaign.budget_ton = budget.clone();
            }
            new_campaign.preferred_date = input.preferred_date;
            if let Some(status) = &input.status {
                new_campaign.status = status.clone();
            }
            let campaign = Campaign::create(conn, &new_campaign)?;
            let entry = NewAuditEntry::new(
                Some(&user_owned),
                ACTOR_USER,
                "campaign_created",
                "campaign",
                Some(&campaign.id),
                None,
            );
            let _ = AuditEntry::append(conn, &entry);
            Ok(campaign)
        })
        .await
    }

    async fn load_owned(&self, campaign_id: &str, user_id: &str) -> Result<Campaign, ApiError> {
        let id = campaign_id.to_string();
        let campaign = with_conn(&self.db, move |conn| Campaign::find(conn, &id))
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("campaign"),
                other => other,
            })?;
        if campaign.advertiser_user_id != user_id {
            return Err(ApiError::not_found("campaign"));
        }
        Ok(campaign)
    }

    pub async fn get(&self, campaign_id: &str, user_id: &str) -> Result<Campaign, ApiError> {
        self.load_owned(campaign_id, user_id).await
    }

    pub async fn list(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, ApiError> {
        let user_owned = user_id.to_string();
        with_conn(&self.db, move |conn| {
            Campaign::list_for_advertiser(conn, &user_owned, limit, offset)
        })
        .await
    }

    pub async fn update(
        &self,
        campaign_id: &str,
        user_id: &str,
        input: CampaignInput,
    ) -> Result<Campaign, ApiError> {
        let existing = self.load_owned(campaign_id, user_id).await?;

        let id = existing.id.clone();
        with_conn(&self.db, move |conn| {
            Campaign::update_fields(
                conn,
                &id,
                input.title.trim(),
                &input.target_audience,
                input.key_messages.as_deref(),
                input.budget_ton.as_deref().unwrap_or(&existing.budget_ton),
                input.preferred_date,
                input.status.as_deref().unwrap_or(&existing.status),
            )?;
            Campaign::find(conn, &id)
        })
        .await
    }

    pub async fn delete(&self, campaign_id: &str, user_id: &str) -> Result<(), ApiError> {
        let existing = self.load_owned(campaign_id, user_id).await?;
        let id = existing.id;
        with_conn(&self.db, move |conn| Campaign::delete(conn, &id)).await?;
        Ok(())
    }
}
