//! Wallet binding flow: proof verification, nonce single-use, withdraw
//! destination gating.

mod common;

use std::sync::Arc;

use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};

use admarket::error::ApiError;
use admarket::events::RecordingPublisher;
use admarket::models::{ProofPayload, WithdrawWallet};
use admarket::services::{ConnectWalletRequest, WalletService};
use admarket::ton::{proof_hash, Proof, ProofDomain};
use common::*;

const DOMAIN: &str = "app.example.com";
const FRIENDLY: &str = "EQDemoFriendlyAddressForTests000000000000000000";

fn wallet_service(pool: &admarket::db::DbPool) -> WalletService {
    WalletService::new(pool.clone(), "testnet".to_string(), vec![DOMAIN.to_string()])
}

fn signed_request(key: &SigningKey, payload: &str) -> ConnectWalletRequest {
    let address_hash = [0x42u8; 32];
    let mut proof = Proof {
        timestamp: Utc::now().timestamp(),
        domain: ProofDomain {
            length_bytes: DOMAIN.len() as u32,
            value: DOMAIN.to_string(),
        },
        payload: payload.to_string(),
        signature: String::new(),
    };
    let hash = proof_hash(&address_hash, 0, &proof);
    proof.signature = hex::encode(key.sign(&hash).to_bytes());

    ConnectWalletRequest {
        address: format!("0:{}", hex::encode(address_hash)),
        address_friendly: FRIENDLY.to_string(),
        network: "testnet".to_string(),
        public_key: hex::encode(key.verifying_key().to_bytes()),
        proof,
    }
}

#[tokio::test]
async fn proof_bound_wallet_connects_and_nonce_is_single_use() {
    let pool = test_pool();
    let wallets = wallet_service(&pool);
    let user = seed_user(&pool, 100, "owner");
    let key = SigningKey::from_bytes(&[9u8; 32]);

    let payload = wallets.generate_payload(Some(&user.id)).await.unwrap();

    let wallet = wallets
        .connect_wallet(&user.id, signed_request(&key, &payload))
        .await
        .unwrap();
    assert!(wallet.verified);
    assert!(wallet.is_active);
    assert_eq!(wallet.address_friendly, FRIENDLY);

    // Replaying the same proof must die on the consumed nonce.
    let err = wallets
        .connect_wallet(&user.id, signed_request(&key, &payload))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn bad_signature_and_wrong_network_are_rejected() {
    let pool = test_pool();
    let wallets = wallet_service(&pool);
    let user = seed_user(&pool, 100, "owner");
    let key = SigningKey::from_bytes(&[9u8; 32]);

    // Forged signature.
    let payload = wallets.generate_payload(Some(&user.id)).await.unwrap();
    let mut req = signed_request(&key, &payload);
    let mut sig = hex::decode(&req.proof.signature).unwrap();
    sig[0] ^= 0x01;
    req.proof.signature = hex::encode(sig);
    let err = wallets.connect_wallet(&user.id, req).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    // Wrong network.
    let payload = wallets.generate_payload(Some(&user.id)).await.unwrap();
    let mut req = signed_request(&key, &payload);
    req.network = "mainnet".to_string();
    let err = wallets.connect_wallet(&user.id, req).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    assert!(wallets.active_wallet(&user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn connecting_a_new_wallet_deactivates_the_previous_one() {
    let pool = test_pool();
    let wallets = wallet_service(&pool);
    let user = seed_user(&pool, 100, "owner");

    let key_a = SigningKey::from_bytes(&[9u8; 32]);
    let payload = wallets.generate_payload(Some(&user.id)).await.unwrap();
    wallets
        .connect_wallet(&user.id, signed_request(&key_a, &payload))
        .await
        .unwrap();

    // Same raw address (same key material path), fresh nonce: upsert
    // reactivates rather than duplicating.
    let payload = wallets.generate_payload(Some(&user.id)).await.unwrap();
    let again = wallets
        .connect_wallet(&user.id, signed_request(&key_a, &payload))
        .await
        .unwrap();
    assert!(again.is_active);

    let active = wallets.active_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(active.id, again.id);

    wallets.disconnect_wallet(&user.id).await.unwrap();
    assert!(wallets.active_wallet(&user.id).await.unwrap().is_none());
}

#[tokio::test]
async fn proof_payload_consume_is_atomic_and_single_shot() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    let payload = ProofPayload::create(&mut conn, None, 300).unwrap();
    assert_eq!(ProofPayload::consume(&mut conn, &payload.payload).unwrap(), 1);
    assert_eq!(ProofPayload::consume(&mut conn, &payload.payload).unwrap(), 0);

    // Expired payloads cannot be consumed at all.
    let expired = ProofPayload::create(&mut conn, None, -10).unwrap();
    assert_eq!(ProofPayload::consume(&mut conn, &expired.payload).unwrap(), 0);
}

#[tokio::test]
async fn withdraw_wallet_must_match_the_verified_active_wallet() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);
    let wallets = wallet_service(&pool);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();

    // No wallet connected yet.
    let err = deals
        .set_withdraw_wallet(&deal.id, &owner.id, FRIENDLY)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    // Connect a verified wallet, then bind by friendly form.
    let key = SigningKey::from_bytes(&[9u8; 32]);
    let payload = wallets.generate_payload(Some(&owner.id)).await.unwrap();
    let connected = wallets
        .connect_wallet(&owner.id, signed_request(&key, &payload))
        .await
        .unwrap();

    // A random address that is not the connected wallet is rejected.
    let err = deals
        .set_withdraw_wallet(&deal.id, &owner.id, "EQsomeOtherAddress")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let saved = deals
        .set_withdraw_wallet(&deal.id, &owner.id, &connected.address_friendly)
        .await
        .unwrap();
    assert_eq!(saved.wallet_address, FRIENDLY);
    assert_eq!(saved.owner_user_id, owner.id);

    // The raw form binds too, and upserts onto the same row.
    let saved_again = deals
        .set_withdraw_wallet(&deal.id, &owner.id, &connected.address)
        .await
        .unwrap();
    assert_eq!(saved_again.id, saved.id);

    {
        let mut conn = pool.get().unwrap();
        let row = WithdrawWallet::by_channel(&mut conn, &channel.id).unwrap();
        assert_eq!(row.wallet_address, FRIENDLY);
    }

    // The advertiser is not the channel owner.
    let err = deals
        .set_withdraw_wallet(&deal.id, &advertiser.id, FRIENDLY)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}
