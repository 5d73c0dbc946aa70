//! Short-lived HMAC-signed access tokens.
//!
//! A token is `base64url(claims_json) . base64url(hmac_sha256(secret, claims_json))`.
//! Claims carry the marketplace user id, the Telegram identity, issue and
//! expiry timestamps and a fixed issuer.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

pub const TOKEN_ISSUER: &str = "ads-marketplace";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("unexpected issuer {0:?}")]
    WrongIssuer(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub telegram_user_id: i64,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

pub fn generate_token(
    secret: &str,
    user_id: &str,
    telegram_user_id: i64,
    ttl: Duration,
) -> String {
    let ttl = if ttl.as_secs() == 0 {
        Duration::from_secs(24 * 3600)
    } else {
        ttl
    };
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id: user_id.to_string(),
        telegram_user_id,
        iat: now,
        exp: now + ttl.as_secs() as i64,
        iss: TOKEN_ISSUER.to_string(),
    };
    let body = serde_json::to_vec(&claims).expect("claims always serialize");
    let mac = sign(secret, &body);
    format!("{}.{}", B64URL.encode(&body), B64URL.encode(mac))
}

pub fn parse_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    let (body_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let body = B64URL.decode(body_b64).map_err(|_| TokenError::Malformed)?;
    let sig = B64URL.decode(sig_b64).map_err(|_| TokenError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(&body);
    mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

    let claims: Claims = serde_json::from_slice(&body).map_err(|_| TokenError::Malformed)?;
    if claims.iss != TOKEN_ISSUER {
        return Err(TokenError::WrongIssuer(claims.iss));
    }
    if claims.exp <= Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

fn sign(secret: &str, body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn round_trip() {
        let token = generate_token(SECRET, "user-1", 42, Duration::from_secs(3600));
        let claims = parse_token(SECRET, &token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        assert_eq!(claims.telegram_user_id, 42);
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token(SECRET, "user-1", 42, Duration::from_secs(3600));
        assert!(matches!(
            parse_token("other-secret", &token),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = generate_token(SECRET, "user-1", 42, Duration::from_secs(3600));
        let (body_b64, sig_b64) = token.split_once('.').unwrap();
        let mut body = B64URL.decode(body_b64).unwrap();
        let json = String::from_utf8(body.clone()).unwrap();
        body = json.replace("user-1", "user-2").into_bytes();
        let forged = format!("{}.{}", B64URL.encode(&body), sig_b64);
        assert!(parse_token(SECRET, &forged).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Zero TTL falls back to 24h, so build an already-expired claims body
        // by hand.
        let claims = Claims {
            user_id: "user-1".to_string(),
            telegram_user_id: 42,
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
            iss: TOKEN_ISSUER.to_string(),
        };
        let body = serde_json::to_vec(&claims).unwrap();
        let mac = sign(SECRET, &body);
        let token = format!("{}.{}", B64URL.encode(&body), B64URL.encode(mac));
        assert!(matches!(parse_token(SECRET, &token), Err(TokenError::Expired)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_token(SECRET, "nodot"), Err(TokenError::Malformed)));
        assert!(matches!(
            parse_token(SECRET, "a.b"),
            Err(TokenError::Malformed) | Err(TokenError::BadSignature)
        ));
    }
}
