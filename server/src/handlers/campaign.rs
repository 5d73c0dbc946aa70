//! Campaign CRUD endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::ok_json;
use crate::middleware::auth_user;
use crate::services::{CampaignInput, CampaignService};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// POST /api/v1/campaigns
pub async fn create_campaign(
    req: HttpRequest,
    campaigns: web::Data<CampaignService>,
    body: web::Json<CampaignInput>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let campaign = campaigns.create(&auth.user_id, body.into_inner()).await?;
    Ok(ok_json(&req, campaign))
}

/// GET /api/v1/campaigns
pub async fn list_campaigns(
    req: HttpRequest,
    campaigns: web::Data<CampaignService>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let list = campaigns
        .list(&auth.user_id, query.limit, query.offset)
        .await?;
    Ok(ok_json(&req, list))
}

/// GET /api/v1/campaigns/{id}
pub async fn get_campaign(
    req: HttpRequest,
    campaigns: web::Data<CampaignService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let campaign = campaigns.get(&path, &auth.user_id).await?;
    Ok(ok_json(&req, campaign))
}

/// PUT /api/v1/campaigns/{id}
pub async fn update_campaign(
    req: HttpRequest,
    campaigns: web::Data<CampaignService>,
    path: web::Path<String>,
    body: web::Json<CampaignInput>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let campaign = campaigns
        .update(&path, &auth.user_id, body.into_inner())
        .await?;
    Ok(ok_json(&req, campaign))
}

/// DELETE /api/v1/campaigns/{id}
pub async fn delete_campaign(
    req: HttpRequest,
    campaigns: web::Data<CampaignService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    campaigns.delete(&path, &auth.user_id).await?;
    Ok(ok_json(&req, json!({ "deleted": true })))
}
