//! Lifecycle worker sweeps: timeout cancellation, hold release gating and
//! post-presence verification.

mod common;

use std::sync::Arc;

use admarket::events::RecordingPublisher;
use admarket::models::escrow::{ESCROW_FUNDED, ESCROW_REFUNDED};
use admarket::models::{DealPost, EscrowLedger};
use admarket::services::{CreativeInput, DealService, HoldReleaseWorker, PostMonitor, TimeoutSweeper};
use common::*;

/// Drives a deal through the service layer into hold_verification, with the
/// escrow funded (funding shortcut goes straight to the ledger).
async fn deal_in_hold(
    pool: &admarket::db::DbPool,
    deals: &Arc<DealService>,
    owner: &admarket::models::User,
    advertiser: &admarket::models::User,
    channel_id: &str,
    post_url: &str,
) -> String {
    let deal = deals
        .create_deal(&advertiser.id, channel_id, "post", None, "", None)
        .await
        .unwrap();
    deals.submit_deal(&deal.id, &advertiser.id).await.unwrap();
    deals.accept_deal(&deal.id, &owner.id).await.unwrap();
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
                text: "hi".into(),
                ..CreativeInput::default()
            },
        )
        .await
        .unwrap();
    deals.approve_creative(&deal.id, &advertiser.id).await.unwrap();
    deals
        .mark_manual_post(&deal.id, &owner.id, post_url)
        .await
        .unwrap();
    assert_eq!(deal_status(pool, &deal.id), "hold_verification");
    deal.id
}

#[tokio::test]
async fn sweeper_cancels_deals_stuck_past_their_timeout() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    // One deal stuck in submitted, one in awaiting_payment, one fresh.
    let stuck_submitted = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    deals
        .submit_deal(&stuck_submitted.id, &advertiser.id)
        .await
        .unwrap();
    backdate_deal(&pool, &stuck_submitted.id, 2 * 86_400);

    let stuck_payment = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    deals
        .submit_deal(&stuck_payment.id, &advertiser.id)
        .await
        .unwrap();
    deals.accept_deal(&stuck_payment.id, &owner.id).await.unwrap();
    backdate_deal(&pool, &stuck_payment.id, 2 * 3_600);

    let fresh = deals
        .create_deal(&advertiser.id, &channel.id, "post", None, "", None)
        .await
        .unwrap();
    deals.submit_deal(&fresh.id, &advertiser.id).await.unwrap();

    let sweeper = TimeoutSweeper::new(pool.clone(), deals.clone(), 86_400, 3_600, 172_800);
    sweeper.sweep_once().await.unwrap();

    assert_eq!(deal_status(&pool, &stuck_submitted.id), "cancelled");
    assert_eq!(deal_status(&pool, &stuck_payment.id), "cancelled");
    assert_eq!(deal_status(&pool, &fresh.id), "submitted");
}

#[tokio::test]
async fn hold_release_waits_for_the_full_hold_period() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal_id = deal_in_hold(
        &pool,
        &deals,
        &owner,
        &advertiser,
        &channel.id,
        "https://t.me/demo/42",
    )
    .await;

    let worker = HoldReleaseWorker::new(pool.clone(), deals.clone());

    // Hold not yet elapsed: nothing happens.
    worker.release_once().await.unwrap();
    assert_eq!(deal_status(&pool, &deal_id), "hold_verification");

    backdate_post(&pool, &deal_id, 2 * 3_600);
    worker.release_once().await.unwrap();
    assert_eq!(deal_status(&pool, &deal_id), "completed");
    assert_eq!(escrow_for(&pool, &deal_id).status, "released");
}

#[tokio::test]
async fn deleted_post_is_flagged_and_refunded() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal_id = deal_in_hold(
        &pool,
        &deals,
        &owner,
        &advertiser,
        &channel.id,
        "https://t.me/demo/42",
    )
    .await;
    assert_eq!(escrow_for(&pool, &deal_id).status, ESCROW_FUNDED);

    let monitor = PostMonitor::without_pause(
        pool.clone(),
        deals.clone(),
        Arc::new(FakePostFetcher::missing()),
    );
    monitor.check_once().await.unwrap();

    assert_eq!(deal_status(&pool, &deal_id), "refunded");
    assert_eq!(escrow_for(&pool, &deal_id).status, ESCROW_REFUNDED);

    {
        let mut conn = pool.get().unwrap();
        let post = DealPost::find_by_deal(&mut conn, &deal_id).unwrap();
        assert!(post.is_deleted);
    }

    // A deleted post also never releases.
    let worker = HoldReleaseWorker::new(pool.clone(), deals.clone());
    backdate_post(&pool, &deal_id, 2 * 3_600);
    worker.release_once().await.unwrap();
    assert_eq!(deal_status(&pool, &deal_id), "refunded");
}

#[tokio::test]
async fn edited_post_is_flagged_but_not_refunded() {
    let pool = test_pool();
    let recorder = RecordingPublisher::new();
    let deals = deal_service(&pool, &recorder);

    let owner = seed_user(&pool, 100, "owner");
    let advertiser = seed_user(&pool, 200, "advertiser");
    let channel = seed_channel(&pool, "demo", &owner);
    seed_post_listing(&pool, &channel.id, "5", 1);

    let deal_id = deal_in_hold(
        &pool,
        &deals,
        &owner,
        &advertiser,
        &channel.id,
        "https://t.me/demo/42",
    )
    .await;

    // The stored hash comes from the post URL, so any fetched text reads as
    // an edit.
    let fetcher = FakePostFetcher::existing("something new");
    let monitor = PostMonitor::without_pause(pool.clone(), deals.clone(), Arc::new(fetcher));
    monitor.check_once().await.unwrap();

    assert_eq!(deal_status(&pool, &deal_id), "hold_verification");
    let mut conn = pool.get().unwrap();
    let post = DealPost::find_by_deal(&mut conn, &deal_id).unwrap();
    assert!(post.is_edited);
    assert!(!post.is_deleted);
    drop(conn);

    // Edited posts are excluded from release.
    backdate_post(&pool, &deal_id, 2 * 3_600);
    let worker = HoldReleaseWorker::new(pool.clone(), deals.clone());
    worker.release_once().await.unwrap();
    assert_eq!(deal_status(&pool, &deal_id), "hold_verification");
}

#[tokio::test]
async fn cancelled_deal_can_be_refunded_by_the_system() {
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
    deals.cancel_deal(&deal.id, &advertiser.id).await.unwrap();

    deals.refund_deal(&deal.id).await.unwrap();
    assert_eq!(deal_status(&pool, &deal.id), "refunded");
    assert_eq!(escrow_for(&pool, &deal.id).status, ESCROW_REFUNDED);
}
