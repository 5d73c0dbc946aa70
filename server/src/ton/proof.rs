//! TON Connect proof verification.
//!
//! Binds an externally held ed25519 keypair to a marketplace user. The
//! signed message is domain-bound and nonce-anchored, so a captured proof
//! cannot be replayed against another site or after its payload expires.

use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const TON_PROOF_PREFIX: &str = "ton-proof-item-v2/";
pub const TON_CONNECT_PREFIX: &str = "ton-connect";

/// Maximum accepted proof age.
pub const MAX_PROOF_AGE_SECS: i64 = 5 * 60;
/// Tolerated clock skew for timestamps from the future.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("proof expired: timestamp is {0}s old")]
    Expired(i64),
    #[error("proof timestamp is in the future")]
    FromFuture,
    #[error("domain {0:?} not in allowed list")]
    DomainNotAllowed(String),
    #[error("invalid public key: {0}")]
    BadPublicKey(String),
    #[error("invalid signature encoding: {0}")]
    BadSignatureEncoding(String),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("invalid raw address: {0}")]
    BadAddress(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub timestamp: i64,
    pub domain: ProofDomain,
    /// The nonce previously issued by the server.
    pub payload: String,
    /// Hex-encoded ed25519 signature.
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofDomain {
    #[serde(rename = "lengthBytes")]
    pub length_bytes: u32,
    pub value: String,
}

/// Verifies a TON Connect proof against a raw account address.
///
/// Message layout, concatenated:
/// `"ton-proof-item-v2/" ++ workchain(4 LE) ++ address_hash(32) ++
///  domain_len(4 LE) ++ domain ++ timestamp(8 LE) ++ payload`,
/// then `final = sha256(0xFFFF ++ "ton-connect" ++ sha256(message))` is the
/// actual ed25519 input. An empty allow-list permits any domain.
pub fn verify_proof(
    public_key_hex: &str,
    address_hash: &[u8; 32],
    workchain: i32,
    proof: &Proof,
    allowed_domains: &[String],
) -> Result<(), ProofError> {
    let now = chrono::Utc::now().timestamp();
    let age = now - proof.timestamp;
    if age > MAX_PROOF_AGE_SECS {
        return Err(ProofError::Expired(age));
    }
    if proof.timestamp > now + MAX_CLOCK_SKEW_SECS {
        return Err(ProofError::FromFuture);
    }

    if !allowed_domains.is_empty() && !allowed_domains.iter().any(|d| d == &proof.domain.value) {
        return Err(ProofError::DomainNotAllowed(proof.domain.value.clone()));
    }

    let pub_key_bytes = hex::decode(public_key_hex)
        .map_err(|e| ProofError::BadPublicKey(e.to_string()))?;
    let pub_key_bytes: [u8; PUBLIC_KEY_LENGTH] = pub_key_bytes
        .try_into()
        .map_err(|_| ProofError::BadPublicKey("wrong key length".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&pub_key_bytes)
        .map_err(|e| ProofError::BadPublicKey(e.to_string()))?;

    let sig_bytes = hex::decode(&proof.signature)
        .map_err(|e| ProofError::BadSignatureEncoding(e.to_string()))?;
    if sig_bytes.len() != SIGNATURE_LENGTH {
        return Err(ProofError::BadSignatureEncoding(format!(
            "wrong signature length: {}",
            sig_bytes.len()
        )));
    }
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|e| ProofError::BadSignatureEncoding(e.to_string()))?;

    let final_hash = proof_hash(address_hash, workchain, proof);

    verifying_key
        .verify(&final_hash, &signature)
        .map_err(|_| ProofError::SignatureMismatch)
}

/// The exact ed25519 input for a proof; shared with tests and any signer.
pub fn proof_hash(address_hash: &[u8; 32], workchain: i32, proof: &Proof) -> [u8; 32] {
    let mut message = Vec::new();
    message.extend_from_slice(TON_PROOF_PREFIX.as_bytes());
    message.extend_from_slice(&(workchain as u32).to_le_bytes());
    message.extend_from_slice(address_hash);
    message.extend_from_slice(&proof.domain.length_bytes.to_le_bytes());
    message.extend_from_slice(proof.domain.value.as_bytes());
    message.extend_from_slice(&(proof.timestamp as u64).to_le_bytes());
    message.extend_from_slice(proof.payload.as_bytes());

    let msg_hash = Sha256::digest(&message);

    let mut sig_input = Vec::with_capacity(2 + TON_CONNECT_PREFIX.len() + 32);
    sig_input.extend_from_slice(&[0xFF, 0xFF]);
    sig_input.extend_from_slice(TON_CONNECT_PREFIX.as_bytes());
    sig_input.extend_from_slice(&msg_hash);

    Sha256::digest(&sig_input).into()
}

/// Parses a raw address of the form `<workchain>:<hex32>`.
pub fn parse_raw_address(raw: &str) -> Result<(i32, [u8; 32]), ProofError> {
    let (wc_str, hash_hex) = raw
        .split_once(':')
        .ok_or_else(|| ProofError::BadAddress(raw.to_string()))?;
    let workchain: i32 = wc_str
        .parse()
        .map_err(|_| ProofError::BadAddress(raw.to_string()))?;
    let hash = hex::decode(hash_hex).map_err(|_| ProofError::BadAddress(raw.to_string()))?;
    let hash: [u8; 32] = hash
        .try_into()
        .map_err(|_| ProofError::BadAddress(format!("address hash must be 32 bytes: {raw}")))?;
    Ok((workchain, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn test_keypair() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn signed_proof(key: &SigningKey, address_hash: &[u8; 32], workchain: i32) -> Proof {
        let mut proof = Proof {
            timestamp: chrono::Utc::now().timestamp(),
            domain: ProofDomain {
                length_bytes: "app.example.com".len() as u32,
                value: "app.example.com".to_string(),
            },
            payload: "746573742d6e6f6e6365".to_string(),
            signature: String::new(),
        };
        let hash = proof_hash(address_hash, workchain, &proof);
        proof.signature = hex::encode(key.sign(&hash).to_bytes());
        proof
    }

    #[test]
    fn valid_proof_verifies() {
        let key = test_keypair();
        let address_hash = [0x42u8; 32];
        let proof = signed_proof(&key, &address_hash, 0);
        let pub_hex = hex::encode(key.verifying_key().to_bytes());

        verify_proof(&pub_hex, &address_hash, 0, &proof, &[]).expect("proof should verify");
        verify_proof(
            &pub_hex,
            &address_hash,
            0,
            &proof,
            &["app.example.com".to_string()],
        )
        .expect("proof should verify with allow-list");
    }

    #[test]
    fn mutations_are_rejected() {
        let key = test_keypair();
        let address_hash = [0x42u8; 32];
        let pub_hex = hex::encode(key.verifying_key().to_bytes());

        // Tampered payload
        let mut proof = signed_proof(&key, &address_hash, 0);
        proof.payload.push('x');
        assert!(matches!(
            verify_proof(&pub_hex, &address_hash, 0, &proof, &[]),
            Err(ProofError::SignatureMismatch)
        ));

        // Tampered domain
        let mut proof = signed_proof(&key, &address_hash, 0);
        proof.domain.value = "evil.example.com".to_string();
        assert!(verify_proof(&pub_hex, &address_hash, 0, &proof, &[]).is_err());

        // Wrong workchain
        let proof = signed_proof(&key, &address_hash, 0);
        assert!(verify_proof(&pub_hex, &address_hash, -1, &proof, &[]).is_err());

        // Wrong address
        let proof = signed_proof(&key, &address_hash, 0);
        assert!(verify_proof(&pub_hex, &[0x43u8; 32], 0, &proof, &[]).is_err());

        // Flipped signature byte
        let mut proof = signed_proof(&key, &address_hash, 0);
        let mut sig = hex::decode(&proof.signature).unwrap();
        sig[0] ^= 0x01;
        proof.signature = hex::encode(sig);
        assert!(verify_proof(&pub_hex, &address_hash, 0, &proof, &[]).is_err());
    }

    #[test]
    fn stale_and_future_timestamps_are_rejected() {
        let key = test_keypair();
        let address_hash = [0x42u8; 32];
        let pub_hex = hex::encode(key.verifying_key().to_bytes());

        let mut proof = signed_proof(&key, &address_hash, 0);
        proof.timestamp -= MAX_PROOF_AGE_SECS + 10;
        assert!(matches!(
            verify_proof(&pub_hex, &address_hash, 0, &proof, &[]),
            Err(ProofError::Expired(_))
        ));

        let mut proof = signed_proof(&key, &address_hash, 0);
        proof.timestamp += MAX_CLOCK_SKEW_SECS + 60;
        assert!(matches!(
            verify_proof(&pub_hex, &address_hash, 0, &proof, &[]),
            Err(ProofError::FromFuture)
        ));
    }

    #[test]
    fn unlisted_domain_is_rejected_with_nonempty_allow_list() {
        let key = test_keypair();
        let address_hash = [0x42u8; 32];
        let proof = signed_proof(&key, &address_hash, 0);
        let pub_hex = hex::encode(key.verifying_key().to_bytes());

        let result = verify_proof(
            &pub_hex,
            &address_hash,
            0,
            &proof,
            &["other.example.com".to_string()],
        );
        assert!(matches!(result, Err(ProofError::DomainNotAllowed(_))));
    }

    #[test]
    fn raw_address_parsing() {
        let hex32 = "ab".repeat(32);
        let (wc, hash) = parse_raw_address(&format!("0:{hex32}")).unwrap();
        assert_eq!(wc, 0);
        assert_eq!(hash, [0xabu8; 32]);

        let (wc, _) = parse_raw_address(&format!("-1:{hex32}")).unwrap();
        assert_eq!(wc, -1);

        assert!(parse_raw_address("invalid").is_err());
        assert!(parse_raw_address("0:short").is_err());
    }
}
