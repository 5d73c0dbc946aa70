//! End-to-end orchestrator scenarios over an in-memory database.

mod common;

use std::sync::Arc;

use admarket::error::ApiError;
use admarket::events::{RecordingPublisher, EVENT_DEAL_STATUS_CHANGED, EVENT_PAYMENT_RECEIVED};
use admarket::kv::MemoryKv;
use admarket::models::escrow::{ESCROW_FUNDED, ESCROW_RELEASED, TX_REF_PENDING_SEND};
use admarket::models::{DealCreative, EscrowLedger, NewEscrow};
use admarket::services::{Actor, CreativeInput, HoldReleaseWorker, TonIndexer};
use admarket::ton::NANO_PER_TON;
use common::*;

#[tokio::test]
async fn happy_path_from_draft_to_released_funds() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    // Draft with the listing's price.
    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "post", Some("brief".into()), "", None)
        .await
        .unwrap();
    assert_eq!(deal.status, "draft");
    assert_eq!(deal.price_ton, "5");
    assert_eq!(deal.hold_period_seconds, 3600);

    deals.submit_deal(&deal.id, &advertiser.id).await.unwrap();
    deals.accept_deal(&deal.id, &owner.id).await.unwrap();
    assert_eq!(deal_status(&pool, &deal.id), "awaiting_payment");

    let escrow = escrow_for(&pool, &deal.id);
    assert_eq!(escrow.deposit_memo, format!("deal:{}", deal.id));
    assert_eq!(escrow.deposit_expected_ton, "5");
    assert_eq!(escrow.deposit_address, HOT_WALLET);
    assert_eq!(escrow.status, "awaiting");

    // Deposit observed on chain.
    let chain = Arc::new(FakeChain::new());
    let kv = Arc::new(MemoryKv::new());
    let indexer = TonIndexer::new(
        chain.clone(),
        kv,
        pool.clone(),
        Arc::new(recorder.clone()),
        HOT_WALLET.to_string(),
    );
    indexer.init_cursor().await.unwrap();
    chain.push_transfer(5, "EQpayer", 5 * NANO_PER_TON, Some(&escrow.deposit_memo));
    indexer.poll_once().await.unwrap();

    assert_eq!(deal_status(&pool, &deal.id), "funded");
    assert_eq!(escrow_for(&pool, &deal.id).status, ESCROW_FUNDED);
    assert_eq!(recorder.events_of_type(EVENT_PAYMENT_RECEIVED).len(), 1);

    // Creative loop.
    let creative = deals
        .submit_creative(
            &deal.id,
            &owner.id,
            CreativeInput {
                text: "hi".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(creative.version, 1);
    assert_eq!(deal_status(&pool, &deal.id), "creative_submitted");

    deals.approve_creative(&deal.id, &advertiser.id).await.unwrap();
    assert_eq!(deal_status(&pool, &deal.id), "creative_approved");

    deals
        .mark_manual_post(&deal.id, &owner.id, "https://t.me/demo/42")
        .await
        .unwrap();
    assert_eq!(deal_status(&pool, &deal.id), "hold_verification");

    // One hour later the release worker fires.
    backdate_post(&pool, &deal.id, 2 * 3600);
    let worker = HoldReleaseWorker::new(pool.clone(), deals.clone());
    worker.release_once().await.unwrap();

    assert_eq!(deal_status(&pool, &deal.id), "completed");
    let escrow = escrow_for(&pool, &deal.id);
    assert_eq!(escrow.status, ESCROW_RELEASED);
    assert_eq!(escrow.release_tx_hash.as_deref(), Some(TX_REF_PENDING_SEND));
    // 3% platform fee off 5 TON.
    assert_eq!(escrow.release_amount_ton.as_deref(), Some("4.85"));

    let transitions: Vec<String> = recorder
        .events_of_type(EVENT_DEAL_STATUS_CHANGED)
        .iter()
        .map(|e| e.payload["new_status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        transitions,
        vec![
            "submitted",
            "accepted",
            "awaiting_payment",
            "creative_pending",
            "creative_submitted",
            "creative_approved",
            "posted",
            "hold_verification",
            "completed",
        ]
    );
}

#[tokio::test]
async fn invalid_transitions_are_rejected_and_terminal_states_absorb() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();

    // Accept straight from draft is not in the table.
    let err = deals.accept_deal(&deal.id, &owner.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)), "got {err:?}");

    // Reject is terminal.
    deals.submit_deal(&deal.id, &advertiser.id).await.unwrap();
    deals.reject_deal(&deal.id, &owner.id).await.unwrap();
    let err = deals.cancel_deal(&deal.id, &advertiser.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(deal_status(&pool, &deal.id), "rejected");
}

#[tokio::test]
async fn only_the_advertiser_may_judge_creatives() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let outsider = seed_user(&pool, 300, "outsider");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    deals.submit_deal(&deal.id, &advertiser.id).await.unwrap();
    deals.accept_deal(&deal.id, &owner.id).await.unwrap();

    // Shortcut funding straight in the ledger.
    {
        let mut conn = pool.get().unwrap();
        EscrowLedger::mark_funded(&mut conn, &deal.id, "1", "EQpayer").unwrap();
        admarket::models::Deal::update_status(&mut conn, &deal.id, "funded").unwrap();
    }

    deals
        .submit_creative(
            &deal.id,
            &owner.id,
            CreativeInput {
                text: "v1".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap();

    let err = deals
        .approve_creative(&deal.id, &outsider.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert_eq!(deal_status(&pool, &deal.id), "creative_submitted");

    // An outsider cannot submit a creative either.
    let err = deals
        .submit_creative(
            &deal.id,
            &outsider.id,
            CreativeInput {
                text: "evil".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn creative_versions_grow_contiguously() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    deals.submit_deal(&deal.id, &advertiser.id).await.unwrap();
    deals.accept_deal(&deal.id, &owner.id).await.unwrap();
    {
        let mut conn = pool.get().unwrap();
        EscrowLedger::mark_funded(&mut conn, &deal.id, "1", "EQpayer").unwrap();
        admarket::models::Deal::update_status(&mut conn, &deal.id, "funded").unwrap();
    }

    let v1 = deals
        .submit_creative(
            &deal.id,
            &owner.id,
            CreativeInput {
                text: "v1".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(v1.version, 1);

    deals
        .request_creative_changes(&deal.id, &advertiser.id, Some("tighter copy".into()))
        .await
        .unwrap();

    let v2 = deals
        .submit_creative(
            &deal.id,
            &owner.id,
            CreativeInput {
                text: "v2".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(v2.version, 2);

    let mut conn = pool.get().unwrap();
    let latest = DealCreative::latest(&mut conn, &deal.id).unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.owner_composed_text.as_deref(), Some("v2"));
    assert_eq!(DealCreative::max_version(&mut conn, &deal.id).unwrap(), 2);
}

#[tokio::test]
async fn repost_creative_requires_source_url() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    {
        let mut conn = pool.get().unwrap();
        let update = admarket::models::ListingUpdate {
            status: Some("active".to_string()),
            price_repost_ton: Some("2".to_string()),
            formats_enabled: vec!["repost".to_string()],
            hold_hours_repost: Some(1),
            ..admarket::models::ListingUpdate::default()
        };
        admarket::models::ChannelListing::upsert(&mut conn, &channel.id, &update).unwrap();
    }

    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "repost", None, "", None)
        .await
        .unwrap();
    deals.submit_deal(&deal.id, &advertiser.id).await.unwrap();
    deals.accept_deal(&deal.id, &owner.id).await.unwrap();
    {
        let mut conn = pool.get().unwrap();
        EscrowLedger::mark_funded(&mut conn, &deal.id, "1", "EQpayer").unwrap();
        admarket::models::Deal::update_status(&mut conn, &deal.id, "funded").unwrap();
    }

    let err = deals
        .submit_creative(
            &deal.id,
            &owner.id,
            CreativeInput {
                text: "no source".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn duplicate_escrow_memo_is_a_storage_conflict() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal_a = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    let deal_b = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();

    let mut conn = pool.get().unwrap();
    EscrowLedger::create(&mut conn, &NewEscrow::awaiting(&deal_a.id, "5", HOT_WALLET)).unwrap();

    // Same memo under a different deal id must be rejected by storage.
    let mut forged = NewEscrow::awaiting(&deal_b.id, "5", HOT_WALLET);
    forged.deposit_memo = format!("deal:{}", deal_a.id);
    let err = EscrowLedger::create(&mut conn, &forged).unwrap_err();
    assert!(matches!(
        err,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _
        )
    ));
}

#[tokio::test]
async fn request_ids_flow_into_audit_trail_and_events() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let actor = Actor::with_request(&advertiser.id, Some("req-abc123".to_string()));
    let deal = deals
        .create_deal(&actor, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    deals.submit_deal(&deal.id, &actor).await.unwrap();

    // Both deal_created and the submit transition carry the correlation id.
    let events = deals.deal_events(&deal.id).await.unwrap();
    assert_eq!(events.len(), 2);
    for entry in &events {
        let meta: serde_json::Value =
            serde_json::from_str(entry.meta.as_deref().unwrap()).unwrap();
        assert_eq!(meta["request_id"], "req-abc123", "action {}", entry.action);
    }

    let changed = recorder.events_of_type(EVENT_DEAL_STATUS_CHANGED);
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].payload["request_id"], "req-abc123");

    // A worker-style cancellation acts without a request id.
    deals.cancel_deal(&deal.id, &advertiser.id).await.unwrap();
    let events = deals.deal_events(&deal.id).await.unwrap();
    let cancelled = events
        .iter()
        .find(|e| e.action.ends_with("to_cancelled"))
        .unwrap();
    let meta: serde_json::Value =
        serde_json::from_str(cancelled.meta.as_deref().unwrap()).unwrap();
    assert!(meta.get("request_id").is_none());
}

#[tokio::test]
async fn price_hint_overrides_listing_price() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "7.25", None)
        .await
        .unwrap();
    assert_eq!(deal.price_ton, "7.25");

    let err = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "not-money", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = deals
        .create_deal(&advertiser.id, &channel.id, "story", None, "", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)), "story is not enabled");
}
