//! Current-user endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::handlers::ok_json;
use crate::middleware::auth_user;
use crate::models::User;

/// GET /api/v1/me
pub async fn get_me(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let user = with_conn(&pool, move |conn| User::find(conn, &auth.user_id))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::not_found("user"),
            other => other,
        })?;
    Ok(ok_json(&req, user))
}

/// POST /api/v1/me/ping, a liveness mark for the explore ranking.
pub async fn ping(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    with_conn(&pool, move |conn| User::touch(conn, &auth.user_id)).await?;
    Ok(ok_json(&req, json!({ "pong": true })))
}
