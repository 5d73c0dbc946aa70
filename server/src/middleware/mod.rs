//! HTTP middleware: bearer authentication and request correlation.

pub mod auth;
pub mod request_context;

pub use auth::{auth_user, AuthUser, RequireAuth};
pub use request_context::{request_id, RequestContext, RequestTrace};
