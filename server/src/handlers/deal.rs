//! Deal lifecycle endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::ok_json;
use crate::middleware::{auth_user, request_id};
use crate::models::DealFilter;
use crate::services::{Actor, CreativeInput, DealService};

/// The authenticated caller plus this request's correlation id, so deal
/// mutations land in the audit log tied to the access-log line.
fn http_actor(req: &HttpRequest) -> Result<Actor, ApiError> {
    let auth = auth_user(req)?;
    Ok(Actor::with_request(&auth.user_id, request_id(req)))
}

#[derive(Deserialize)]
pub struct CreateDealRequest {
    pub channel_id: String,
    pub ad_format: String,
    pub brief: Option<String>,
    #[serde(default)]
    pub price_ton: String,
    pub scheduled_at: Option<NaiveDateTime>,
}

#[derive(Deserialize)]
pub struct ListDealsQuery {
    pub channel_id: Option<String>,
    pub status: Option<String>,
    /// "advertiser" (default) lists the caller's own deals, "owner" lists
    /// deals on channels the caller manages.
    pub role: Option<String>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Option<String>,
}

#[derive(Deserialize)]
pub struct MarkManualPostRequest {
    pub post_url: String,
}

#[derive(Deserialize)]
pub struct SetWithdrawWalletRequest {
    pub wallet_address: String,
}

/// POST /api/v1/deals
pub async fn create_deal(
    req: HttpRequest,
    deals: web::Data<DealService>,
    body: web::Json<CreateDealRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    let body = body.into_inner();
    let deal = deals
        .create_deal(
            &actor,
            &body.channel_id,
            &body.ad_format,
            body.brief,
            &body.price_ton,
            body.scheduled_at,
        )
        .await?;
    Ok(ok_json(&req, deal))
}

/// GET /api/v1/deals
pub async fn list_deals(
    req: HttpRequest,
    deals: web::Data<DealService>,
    query: web::Query<ListDealsQuery>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let mut filter = DealFilter {
        channel_id: query.channel_id.clone(),
        status: query.status.clone(),
        limit: query.limit,
        offset: query.offset,
        ..DealFilter::default()
    };
    match query.role.as_deref() {
        Some("owner") => filter.member_user_id = Some(auth.user_id),
        _ => filter.advertiser_user_id = Some(auth.user_id),
    }
    let list = deals.list_deals(filter).await?;
    Ok(ok_json(&req, list))
}

/// GET /api/v1/deals/{id}
pub async fn get_deal(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let deal = deals.get_deal(&path).await?;
    Ok(ok_json(&req, deal))
}

/// POST /api/v1/deals/{id}/submit
pub async fn submit_deal(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals.submit_deal(&path, &actor).await?;
    Ok(ok_json(&req, json!({ "status": "submitted" })))
}

/// POST /api/v1/deals/{id}/accept
pub async fn accept_deal(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals.accept_deal(&path, &actor).await?;
    let payment = deals.payment_info(&path).await?;
    Ok(ok_json(&req, payment))
}

/// POST /api/v1/deals/{id}/reject
pub async fn reject_deal(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals.reject_deal(&path, &actor).await?;
    Ok(ok_json(&req, json!({ "status": "rejected" })))
}

/// POST /api/v1/deals/{id}/cancel
pub async fn cancel_deal(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals.cancel_deal(&path, &actor).await?;
    Ok(ok_json(&req, json!({ "status": "cancelled" })))
}

/// GET /api/v1/deals/{id}/creative
pub async fn get_creative(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let creative = deals.latest_creative(&path).await?;
    Ok(ok_json(&req, creative))
}

/// POST /api/v1/deals/{id}/creative
pub async fn submit_creative(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
    body: web::Json<CreativeInput>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    let creative = deals
        .submit_creative(&path, &actor, body.into_inner())
        .await?;
    Ok(ok_json(&req, creative))
}

/// POST /api/v1/deals/{id}/creative/approve
pub async fn approve_creative(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals.approve_creative(&path, &actor).await?;
    Ok(ok_json(&req, json!({ "status": "creative_approved" })))
}

/// POST /api/v1/deals/{id}/creative/request-changes
pub async fn request_creative_changes(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
    body: web::Json<FeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals
        .request_creative_changes(&path, &actor, body.into_inner().feedback)
        .await?;
    Ok(ok_json(&req, json!({ "status": "creative_changes_requested" })))
}

/// POST /api/v1/deals/{id}/post/mark-manual
pub async fn mark_manual_post(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
    body: web::Json<MarkManualPostRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    deals
        .mark_manual_post(&path, &actor, &body.post_url)
        .await?;
    Ok(ok_json(&req, json!({ "status": "hold_verification" })))
}

/// POST /api/v1/deals/{id}/finance/set-withdraw-wallet
pub async fn set_withdraw_wallet(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
    body: web::Json<SetWithdrawWalletRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = http_actor(&req)?;
    let wallet = deals
        .set_withdraw_wallet(&path, &actor, &body.wallet_address)
        .await?;
    Ok(ok_json(&req, wallet))
}

/// GET /api/v1/deals/{id}/events
pub async fn deal_events(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let events = deals.deal_events(&path).await?;
    Ok(ok_json(&req, events))
}

/// GET /api/v1/deals/{id}/payment
pub async fn payment_info(
    req: HttpRequest,
    deals: web::Data<DealService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let payment = deals.payment_info(&path).await?;
    Ok(ok_json(&req, payment))
}
