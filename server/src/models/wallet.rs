//! Connected TON wallets and single-use proof payloads.
//!
//! A user has at most one active wallet; connecting a new one deactivates
//! the rest. Proof payloads are nonces: consumed exactly once, only before
//! expiry; the guarded UPDATE in `consume` is what makes replays fail.

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{ton_proof_payloads, user_wallets};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = user_wallets)]
pub struct UserWallet {
    pub id: String,
    pub user_id: String,
    pub address: String,
    pub address_friendly: String,
    pub network: String,
    pub public_key: String,
    #[serde(skip_serializing)]
    pub proof_payload: String,
    #[serde(skip_serializing)]
    pub proof_signature: String,
    #[serde(skip_serializing)]
    pub proof_timestamp: i64,
    #[serde(skip_serializing)]
    pub proof_domain: String,
    pub verified: bool,
    pub connected_at: NaiveDateTime,
    pub disconnected_at: Option<NaiveDateTime>,
    pub is_active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = user_wallets)]
pub struct NewUserWallet {
    pub id: String,
    pub user_id: String,
    pub address: String,
    pub address_friendly: String,
    pub network: String,
    pub public_key: String,
    pub proof_payload: String,
    pub proof_signature: String,
    pub proof_timestamp: i64,
    pub proof_domain: String,
    pub verified: bool,
    pub connected_at: NaiveDateTime,
    pub is_active: bool,
}

impl UserWallet {
    pub fn active_for_user(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<UserWallet> {
        user_wallets::table
            .filter(user_wallets::user_id.eq(user_id))
            .filter(user_wallets::is_active.eq(true))
            .order(user_wallets::connected_at.desc())
            .first(conn)
    }

    pub fn deactivate_all(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<usize> {
        diesel::update(
            user_wallets::table
                .filter(user_wallets::user_id.eq(user_id))
                .filter(user_wallets::is_active.eq(true)),
        )
        .set((
            user_wallets::is_active.eq(false),
            user_wallets::disconnected_at.eq(Some(Utc::now().naive_utc())),
        ))
        .execute(conn)
    }

    /// Upsert keyed on `(user_id, address)`: reconnecting a known address
    /// refreshes the proof materials and reactivates the row.
    pub fn connect(conn: &mut SqliteConnection, wallet: &NewUserWallet) -> QueryResult<UserWallet> {
        let existing: Option<UserWallet> = user_wallets::table
            .filter(user_wallets::user_id.eq(&wallet.user_id))
            .filter(user_wallets::address.eq(&wallet.address))
            .first(conn)
            .optional()?;

        match existing {
            Some(row) => {
                diesel::update(user_wallets::table.find(&row.id))
                    .set((
                        user_wallets::public_key.eq(&wallet.public_key),
                        user_wallets::proof_payload.eq(&wallet.proof_payload),
                        user_wallets::proof_signature.eq(&wallet.proof_signature),
                        user_wallets::proof_timestamp.eq(wallet.proof_timestamp),
                        user_wallets::proof_domain.eq(&wallet.proof_domain),
                        user_wallets::verified.eq(wallet.verified),
                        user_wallets::is_active.eq(true),
                        user_wallets::disconnected_at.eq(None::<NaiveDateTime>),
                        user_wallets::connected_at.eq(Utc::now().naive_utc()),
                    ))
                    .execute(conn)?;
                user_wallets::table.find(&row.id).first(conn)
            }
            None => {
                diesel::insert_into(user_wallets::table)
                    .values(wallet)
                    .execute(conn)?;
                user_wallets::table.find(&wallet.id).first(conn)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = ton_proof_payloads)]
pub struct ProofPayload {
    pub id: String,
    pub payload: String,
    pub user_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub used: bool,
}

#[derive(Insertable)]
#[diesel(table_name = ton_proof_payloads)]
struct NewProofPayload<'a> {
    id: String,
    payload: String,
    user_id: Option<&'a str>,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
    used: bool,
}

impl ProofPayload {
    /// Mints a 32-byte random hex nonce with the given TTL.
    pub fn create(
        conn: &mut SqliteConnection,
        user_id: Option<&str>,
        ttl_seconds: i64,
    ) -> QueryResult<ProofPayload> {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);

        let now = Utc::now().naive_utc();
        let new_payload = NewProofPayload {
            id: Uuid::new_v4().to_string(),
            payload: hex::encode(nonce),
            user_id,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            used: false,
        };
        diesel::insert_into(ton_proof_payloads::table)
            .values(&new_payload)
            .execute(conn)?;
        ton_proof_payloads::table.find(&new_payload.id).first(conn)
    }

    /// Single-shot consumption: succeeds only for an unused, unexpired row.
    pub fn consume(conn: &mut SqliteConnection, payload: &str) -> QueryResult<usize> {
        diesel::update(
            ton_proof_payloads::table
                .filter(ton_proof_payloads::payload.eq(payload))
                .filter(ton_proof_payloads::used.eq(false))
                .filter(ton_proof_payloads::expires_at.gt(Utc::now().naive_utc())),
        )
        .set(ton_proof_payloads::used.eq(true))
        .execute(conn)
    }
}
