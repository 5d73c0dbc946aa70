//! Wallet binding: proof payload issuance and TON Connect verification.
//!
//! The payload is a single-use nonce; consuming it and verifying the
//! signed proof happen in that order, so a replayed proof dies on the
//! nonce before any signature work.

use chrono::Utc;
use diesel::OptionalExtension;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{with_conn, DbPool};
use crate::error::ApiError;
use crate::models::audit::ACTOR_USER;
use crate::models::{AuditEntry, NewAuditEntry, NewUserWallet, ProofPayload, User, UserWallet};
use crate::ton::{parse_raw_address, verify_proof, Proof};

pub const PROOF_PAYLOAD_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Deserialize)]
pub struct ConnectWalletRequest {
    /// Raw form: `<workchain>:<hex32>`.
    pub address: String,
    pub address_friendly: String,
    #[serde(default)]
    pub network: String,
    /// Hex-encoded ed25519 public key.
    pub public_key: String,
    pub proof: Proof,
}

pub struct WalletService {
    db: DbPool,
    ton_network: String,
    allowed_domains: Vec<String>,
}

impl WalletService {
    pub fn new(db: DbPool, ton_network: String, allowed_domains: Vec<String>) -> Self {
        Self {
            db,
            ton_network,
            allowed_domains,
        }
    }

    /// Issues a nonce for the client to embed in its signed proof.
    pub async fn generate_payload(&self, user_id: Option<&str>) -> Result<String, ApiError> {
        let user_id = user_id.map(str::to_string);
        let payload = with_conn(&self.db, move |conn| {
            ProofPayload::create(conn, user_id.as_deref(), PROOF_PAYLOAD_TTL_SECS)
        })
        .await?;
        Ok(payload.payload)
    }

    pub async fn connect_wallet(
        &self,
        user_id: &str,
        req: ConnectWalletRequest,
    ) -> Result<UserWallet, ApiError> {
        // 1. Nonce first: single-shot, so a replay dies here.
        let nonce = req.proof.payload.clone();
        let consumed = with_conn(&self.db, move |conn| ProofPayload::consume(conn, &nonce)).await?;
        if consumed == 0 {
            return Err(ApiError::Conflict(
                "invalid or expired proof payload".to_string(),
            ));
        }

        // 2. Address and network.
        let (workchain, address_hash) = parse_raw_address(&req.address)
            .map_err(|e| ApiError::validation(format!("invalid TON address: {e}")))?;
        if !req.network.is_empty() && req.network != self.ton_network {
            return Err(ApiError::validation(format!(
                "network mismatch: expected {}, got {}",
                self.ton_network, req.network
            )));
        }

        // 3. The signature itself.
        verify_proof(
            &req.public_key,
            &address_hash,
            workchain,
            &req.proof,
            &self.allowed_domains,
        )
        .map_err(|e| ApiError::validation(format!("proof verification failed: {e}")))?;

        // 4. One active wallet per user: deactivate the rest, bind this one.
        let user_owned = user_id.to_string();
        let wallet_row = NewUserWallet {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            address: req.address.clone(),
            address_friendly: req.address_friendly.clone(),
            network: req.network.clone(),
            public_key: req.public_key.clone(),
            proof_payload: req.proof.payload.clone(),
            proof_signature: req.proof.signature.clone(),
            proof_timestamp: req.proof.timestamp,
            proof_domain: req.proof.domain.value.clone(),
            verified: true,
            connected_at: Utc::now().naive_utc(),
            is_active: true,
        };
        let wallet = with_conn(&self.db, move |conn| {
            UserWallet::deactivate_all(conn, &user_owned)?;
            let wallet = UserWallet::connect(conn, &wallet_row)?;
            User::set_wallet_address(conn, &user_owned, Some(&wallet.address_friendly))?;
            let entry = NewAuditEntry::new(
                Some(&user_owned),
                ACTOR_USER,
                "wallet_connected",
                "user_wallet",
                Some(&wallet.id),
                Some(json!({
                    "address": wallet.address_friendly,
                    "network": wallet.network,
                })),
            );
            let _ = AuditEntry::append(conn, &entry);
            Ok(wallet)
        })
        .await?;

        info!(user_id = %user_id, address = %wallet.address_friendly, "wallet connected");
        Ok(wallet)
    }

    pub async fn disconnect_wallet(&self, user_id: &str) -> Result<(), ApiError> {
        let user_owned = user_id.to_string();
        with_conn(&self.db, move |conn| {
            UserWallet::deactivate_all(conn, &user_owned)?;
            User::set_wallet_address(conn, &user_owned, None)?;
            let entry = NewAuditEntry::new(
                Some(&user_owned),
                ACTOR_USER,
                "wallet_disconnected",
                "user",
                Some(&user_owned),
                None,
            );
            if let Err(e) = AuditEntry::append(conn, &entry) {
                warn!(error = %e, "audit append failed");
            }
            Ok(())
        })
        .await
    }

    pub async fn active_wallet(&self, user_id: &str) -> Result<Option<UserWallet>, ApiError> {
        let user_owned = user_id.to_string();
        with_conn(&self.db, move |conn| {
            UserWallet::active_for_user(conn, &user_owned).optional()
        })
        .await
    }
}
