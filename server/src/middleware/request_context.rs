//! Request correlation.
//!
//! Every request carries a correlation id: it rides in the tracing span,
//! the success envelope, the `x-request-id` response header, the access
//! log line this middleware emits on completion, and (through
//! `services::deal::Actor`) the audit trail of any deal operation the
//! request performs. A client-supplied `X-Request-ID` is honoured when it
//! is 8..=64 chars of `[A-Za-z0-9_-]`; anything else gets a freshly
//! minted 24-hex-char id.

use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Instant;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage, HttpRequest};
use rand::RngCore;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation data attached to the request by [`RequestTrace`].
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    started: Instant,
}

impl RequestContext {
    fn begin(request_id: String) -> Self {
        Self {
            request_id,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// The correlation id of the current request, if [`RequestTrace`] ran.
pub fn request_id(req: &HttpRequest) -> Option<String> {
    req.extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
}

fn mint_request_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn acceptable_client_id(value: &str) -> bool {
    (8..=64).contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Middleware owning correlation ids and the access log.
pub struct RequestTrace;

impl<S, B> Transform<S, ServiceRequest> for RequestTrace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTraceService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTraceService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestTraceService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestTraceService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = futures_util::future::LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        Box::pin(async move {
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| acceptable_client_id(v))
                .map(str::to_string)
                .unwrap_or_else(mint_request_id);

            let method = req.method().clone();
            let path = req.path().to_string();

            let ctx = RequestContext::begin(request_id.clone());
            req.extensions_mut().insert(ctx.clone());

            let span = tracing::info_span!("request", request_id = %request_id);
            let _guard = span.enter();

            let mut res = svc.call(req).await?;

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }

            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = res.status().as_u16(),
                elapsed_ms = ctx.elapsed_ms(),
                "request completed"
            );

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_policy() {
        assert!(acceptable_client_id("abc-123_XYZ"));
        assert!(acceptable_client_id(&"a".repeat(64)));
        // Too short, too long, bad characters.
        assert!(!acceptable_client_id("short"));
        assert!(!acceptable_client_id(&"a".repeat(65)));
        assert!(!acceptable_client_id("has space!"));
        assert!(!acceptable_client_id("semi;colon"));
    }

    #[test]
    fn minted_ids_are_hex_and_distinct() {
        let a = mint_request_id();
        let b = mint_request_id();
        assert_eq!(a.len(), 24);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
