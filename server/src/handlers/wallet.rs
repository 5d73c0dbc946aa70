//! Wallet connection endpoints (TON Connect proof flow).

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::ok_json;
use crate::middleware::auth_user;
use crate::services::{ConnectWalletRequest, WalletService};

/// POST /api/v1/me/wallet/proof-payload
pub async fn proof_payload(
    req: HttpRequest,
    wallets: web::Data<WalletService>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let payload = wallets.generate_payload(Some(&auth.user_id)).await?;
    Ok(ok_json(&req, json!({ "payload": payload })))
}

/// POST /api/v1/me/wallet/connect
pub async fn connect_wallet(
    req: HttpRequest,
    wallets: web::Data<WalletService>,
    body: web::Json<ConnectWalletRequest>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let wallet = wallets.connect_wallet(&auth.user_id, body.into_inner()).await?;
    Ok(ok_json(&req, wallet))
}

/// DELETE /api/v1/me/wallet
pub async fn disconnect_wallet(
    req: HttpRequest,
    wallets: web::Data<WalletService>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    wallets.disconnect_wallet(&auth.user_id).await?;
    Ok(ok_json(&req, json!({ "disconnected": true })))
}

/// GET /api/v1/me/wallet
pub async fn get_wallet(
    req: HttpRequest,
    wallets: web::Data<WalletService>,
) -> Result<HttpResponse, ApiError> {
    let auth = auth_user(&req)?;
    let wallet = wallets.active_wallet(&auth.user_id).await?;
    Ok(ok_json(&req, wallet))
}
