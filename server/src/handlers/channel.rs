//! Channel, listing and explore endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::ok_json;
use crate::middleware::auth_user;
use crate::models::{ChannelFilter, ListingUpdate};
use crate::services::{ChannelService, ExploreFilter};

#[derive(Deserialize)]
pub struct CreateChannelRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub bot_status: Option<String>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Deserialize)]
pub struct ExploreQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub min_subscribers: Option<i32>,
    pub min_avg_views: Option<i32>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Deserialize)]
pub struct AddManagerRequest {
    pub telegram_user_id: i64,
}

/// POST /api/v1/channels
pub async fn create_channel(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    body: web::Json<CreateChannelRequest>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let channel = channels.create_channel(&body.username, &auth.user_id).await?;
    Ok(ok_json(&req, channel))
}

/// GET /api/v1/channels/my
pub async fn my_channels(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let list = channels.my_channels(&auth.user_id).await?;
    Ok(ok_json(&req, list))
}

/// GET /api/v1/channels
pub async fn search_channels(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let filter = ChannelFilter {
        query: query.q.clone(),
        bot_status: query.bot_status.clone(),
        limit: query.limit,
        offset: query.offset,
    };
    let list = channels.search(filter).await?;
    Ok(ok_json(&req, list))
}

/// GET /api/v1/channels/{id}
pub async fn get_channel(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let channel = channels.get_channel(&path).await?;
    Ok(ok_json(&req, channel))
}

/// GET /api/v1/channels/{id}/stats
pub async fn channel_stats(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let stats = channels.latest_stats(&path).await?;
    Ok(ok_json(&req, stats))
}

/// POST /api/v1/channels/{id}/invite-bot
pub async fn invite_bot(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let instructions = channels.bot_invite_link(&path).await?;
    Ok(ok_json(&req, json!({ "instructions": instructions })))
}

/// POST /api/v1/channels/{id}/managers
pub async fn add_manager(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
    body: web::Json<AddManagerRequest>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let member = channels
        .add_manager(&path, &auth.user_id, body.telegram_user_id)
        .await?;
    Ok(ok_json(&req, member))
}

/// GET /api/v1/channels/{id}/admins
pub async fn channel_admins(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let admins = channels.admins(&path).await?;
    Ok(ok_json(&req, admins))
}

/// GET /api/v1/explore/channels
pub async fn explore_channels(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    query: web::Query<ExploreQuery>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let filter = ExploreFilter {
        channels: ChannelFilter {
            query: query.q.clone(),
            bot_status: None,
            limit: query.limit,
            offset: query.offset,
        },
        category: query.category.clone(),
        language: query.language.clone(),
        min_subscribers: query.min_subscribers,
        min_avg_views: query.min_avg_views,
    };
    let cards = channels.explore(filter).await?;
    Ok(ok_json(&req, cards))
}

/// PUT /api/v1/listings/{channel_id}
pub async fn update_listing(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
    body: web::Json<ListingUpdate>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let listing = channels
        .upsert_listing(&path, &auth.user_id, body.into_inner())
        .await?;
    Ok(ok_json(&req, listing))
}

/// GET /api/v1/listings/{channel_id}
pub async fn get_listing(
    req: HttpRequest,
    channels: web::Data<ChannelService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth_user(&req)?;
    let listing = channels.get_listing(&path).await?;
    Ok(ok_json(&req, listing))
}
