//! API error type shared by handlers, services and middleware.
//!
//! Every fallible operation in the service layer returns `ApiError` so the
//! HTTP layer can translate failures into stable status codes:
//! 400 validation, 401 authentication, 403 authorization, 404 missing,
//! 409 conflict (invalid transition, duplicate memo, replayed nonce),
//! 502 upstream collaborator failure, 500 everything else.
//!
//! Error bodies are `{ok: false, error}`. `error_response` renders from the
//! error value alone and cannot reach the request, so the correlation id
//! accompanies failures only as the `x-request-id` response header that the
//! trace middleware stamps on every response.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ApiError::NotFound(format!("{} not found", what.into()))
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        ApiError::Conflict(format!("invalid transition from {from} to {to}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, ApiError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
            // Do not leak internals to clients.
            return HttpResponse::InternalServerError()
                .json(json!({ "ok": false, "error": "internal server error" }));
        }
        HttpResponse::build(self.status_code())
            .json(json!({ "ok": false, "error": self.to_string() }))
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::NotFound => ApiError::NotFound("record not found".to_string()),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ApiError::Conflict(format!("duplicate record: {}", info.message()))
            }
            other => ApiError::Internal(format!("database error: {other}")),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        ApiError::Internal(format!("connection pool error: {e}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task panicked: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(
            ApiError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::not_found("deal").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::invalid_transition("draft", "funded").status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn diesel_not_found_maps_to_404() {
        let e: ApiError = diesel::result::Error::NotFound.into();
        assert!(matches!(e, ApiError::NotFound(_)));
    }
}
