//! Telegram WebApp initData validation.
//!
//! The mini-app hands us a form-encoded blob signed by Telegram:
//! `hash = HMAC-SHA256(secret, data_check_string)` where
//! `secret = HMAC-SHA256("WebAppData", bot_token)` and the data-check string
//! is every `k=v` pair except `hash`, sorted, joined with newlines.
//! `auth_date` must be fresh.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_INIT_DATA_MAX_AGE: Duration = Duration::from_secs(5 * 60);
const MAX_AUTH_DATE_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum InitDataError {
    #[error("invalid initData format")]
    Malformed,
    #[error("hash is missing from initData")]
    MissingHash,
    #[error("auth_date is missing from initData")]
    MissingAuthDate,
    #[error("auth_date is not a valid unix timestamp")]
    BadAuthDate,
    #[error("initData expired: auth_date is {0}s old (max {1}s)")]
    Expired(i64, u64),
    #[error("auth_date is in the future")]
    FromFuture,
    #[error("invalid hash: data integrity check failed")]
    HashMismatch,
}

/// Validated initData fields, `hash` excluded.
pub type InitDataFields = BTreeMap<String, String>;

pub fn validate_init_data(
    init_data: &str,
    bot_token: &str,
    max_age: Duration,
) -> Result<InitDataFields, InitDataError> {
    let max_age = if max_age.as_secs() == 0 {
        DEFAULT_INIT_DATA_MAX_AGE
    } else {
        max_age
    };

    let mut fields: InitDataFields = BTreeMap::new();
    let mut received_hash = None;
    for (key, value) in url::form_urlencoded::parse(init_data.as_bytes()) {
        if key == "hash" {
            received_hash = Some(value.into_owned());
        } else {
            fields.insert(key.into_owned(), value.into_owned());
        }
    }
    if fields.is_empty() {
        return Err(InitDataError::Malformed);
    }
    let received_hash = received_hash.ok_or(InitDataError::MissingHash)?;

    // Freshness first: an expired blob is useless even if the MAC matches.
    let auth_date: i64 = fields
        .get("auth_date")
        .ok_or(InitDataError::MissingAuthDate)?
        .parse()
        .map_err(|_| InitDataError::BadAuthDate)?;
    let now = Utc::now().timestamp();
    let age = now - auth_date;
    if age > max_age.as_secs() as i64 {
        return Err(InitDataError::Expired(age, max_age.as_secs()));
    }
    if auth_date > now + MAX_AUTH_DATE_SKEW_SECS {
        return Err(InitDataError::FromFuture);
    }

    // BTreeMap iteration is already sorted by key.
    let data_check_string = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let secret = hmac_sha256(b"WebAppData", bot_token.as_bytes());
    let calculated = hmac_sha256(&secret, data_check_string.as_bytes());

    if hex::encode(calculated) != received_hash {
        return Err(InitDataError::HashMismatch);
    }

    Ok(fields)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
