//! WebSocket upgrade endpoint.
//!
//! Browsers cannot set headers on a WebSocket handshake, so the bearer
//! token arrives as a `?token=` query parameter.

use actix::Addr;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use tracing::debug;

use crate::auth::parse_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::websocket::{WsHub, WsSession};

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /ws?token=<bearer>
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    config: web::Data<Config>,
    hub: web::Data<Addr<WsHub>>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = query
        .token
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("missing token".to_string()))?;

    let claims = parse_token(&config.token_secret, token).map_err(|e| {
        debug!(error = %e, "websocket token rejected");
        ApiError::Unauthorized("invalid or expired token".to_string())
    })?;

    let session = WsSession::new(claims.user_id, hub.get_ref().clone());
    ws::start(session, &req, stream)
}
