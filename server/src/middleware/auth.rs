//! Bearer-token authentication middleware.
//!
//! Validates the `Authorization: Bearer <token>` header and attaches the
//! authenticated identity to request extensions. Handlers read it back
//! through [`auth_user`].

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use tracing::debug;

use crate::auth::parse_token;
use crate::config::Config;
use crate::error::ApiError;

/// Authenticated identity attached to the request.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub telegram_user_id: i64,
}

/// Reads the authenticated identity a handler is running under.
pub fn auth_user(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

pub struct RequireAuth;

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        Box::pin(async move {
            let config = req
                .app_data::<actix_web::web::Data<Config>>()
                .ok_or_else(|| ApiError::Internal("configuration missing".to_string()))?;

            let header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    ApiError::Unauthorized("missing authorization header".to_string())
                })?;

            let token = header.strip_prefix("Bearer ").ok_or_else(|| {
                ApiError::Unauthorized("invalid authorization format".to_string())
            })?;

            let claims = parse_token(&config.token_secret, token).map_err(|e| {
                debug!(error = %e, "token rejected");
                ApiError::Unauthorized("invalid or expired token".to_string())
            })?;

            req.extensions_mut().insert(AuthUser {
                user_id: claims.user_id,
                telegram_user_id: claims.telegram_user_id,
            });

            svc.call(req).await
        })
    }
}
