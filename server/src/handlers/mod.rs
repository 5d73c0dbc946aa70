//! HTTP handlers. Thin: decode, authorize via the service layer, respond.
//!
//! Success bodies use the `{ok: true, data, request_id}` envelope. Error
//! bodies are `{ok: false, error}`: actix renders them from the error value
//! alone, with no request in scope, so on failures the correlation id is
//! delivered only via the `x-request-id` response header.

pub mod auth;
pub mod campaign;
pub mod channel;
pub mod deal;
pub mod user;
pub mod wallet;
pub mod ws;

use actix_web::{HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::middleware::request_id;

/// Success envelope with the request's correlation id.
pub fn ok_json<T: Serialize>(req: &HttpRequest, data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "ok": true,
        "data": data,
        "request_id": request_id(req),
    }))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
