//! Telegram WebApp login.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::{generate_token, validate_init_data};
use crate::config::Config;
use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::handlers::ok_json;
use crate::models::User;

#[derive(Deserialize)]
pub struct TelegramAuthRequest {
    #[serde(alias = "initData")]
    pub init_data: String,
}

/// Profile fields embedded in initData's `user` JSON value.
#[derive(Deserialize)]
struct InitDataUser {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// POST /api/v1/auth/telegram
pub async fn telegram_auth(
    req: HttpRequest,
    config: web::Data<Config>,
    pool: web::Data<DbPool>,
    body: web::Json<TelegramAuthRequest>,
) -> Result<HttpResponse, ApiError> {
    let fields = validate_init_data(&body.init_data, &config.bot_token, config.init_data_max_age)
        .map_err(|e| {
            debug!(error = %e, "initData rejected");
            ApiError::Unauthorized(e.to_string())
        })?;

    let user_json = fields
        .get("user")
        .ok_or_else(|| ApiError::Unauthorized("user is missing from initData".to_string()))?;
    let tg_user: InitDataUser = serde_json::from_str(user_json)
        .map_err(|_| ApiError::Unauthorized("user field is not valid JSON".to_string()))?;

    let user = with_conn(&pool, move |conn| {
        User::upsert_by_telegram_id(
            conn,
            tg_user.id,
            tg_user.username.as_deref(),
            tg_user.first_name.as_deref(),
            tg_user.last_name.as_deref(),
        )
    })
    .await?;

    let token = generate_token(
        &config.token_secret,
        &user.id,
        user.telegram_user_id,
        config.token_ttl,
    );

    Ok(ok_json(&req, json!({ "token": token, "user": user })))
}
