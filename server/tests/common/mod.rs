//! Shared fixtures: an in-memory database, a scripted chain, a canned
//! page fetcher and seed helpers used across the integration suites.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use admarket::db::{create_pool, run_migrations, DbPool};
use admarket::events::RecordingPublisher;
use admarket::models::channel::ROLE_OWNER;
use admarket::models::listing::LISTING_ACTIVE;
use admarket::models::{
    Channel, ChannelMember, ListingUpdate, NewChannel, NewChannelMember, User,
};
use admarket::services::tme_client::{PostCheck, PostFetcher};
use admarket::services::DealService;
use admarket::ton::{encode_comment, AccountState, ChainApi, ChainTx, InboundTransfer};

pub const HOT_WALLET: &str = "EQC6y6Gz6d1W7jW3qS8Fh6hbQ8m0k5rP1vX2cD3eF4gH5iJ6";
pub const PLATFORM_FEE_BPS: i32 = 300;
pub const DEFAULT_HOLD_SECS: i32 = 3600;

/// One shared in-memory SQLite connection; a larger pool would hand every
/// connection its own empty database.
pub fn test_pool() -> DbPool {
    let pool = create_pool(":memory:", 1).expect("test pool");
    run_migrations(&pool).expect("migrations");
    pool
}

pub fn deal_service(pool: &DbPool, recorder: &RecordingPublisher) -> Arc<DealService> {
    Arc::new(DealService::new(
        pool.clone(),
        Arc::new(recorder.clone()),
        HOT_WALLET.to_string(),
        PLATFORM_FEE_BPS,
        DEFAULT_HOLD_SECS,
    ))
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

pub fn seed_user(pool: &DbPool, telegram_id: i64, username: &str) -> User {
    let mut conn = pool.get().unwrap();
    User::upsert_by_telegram_id(&mut conn, telegram_id, Some(username), None, None).unwrap()
}

pub fn seed_channel(pool: &DbPool, username: &str, owner: &User) -> Channel {
    let mut conn = pool.get().unwrap();
    let channel = Channel::create(&mut conn, &NewChannel::pending(username, &owner.id)).unwrap();
    ChannelMember::add(
        &mut conn,
        &NewChannelMember::new(&channel.id, &owner.id, ROLE_OWNER, true),
    )
    .unwrap();
    channel
}

pub fn seed_post_listing(pool: &DbPool, channel_id: &str, price_post: &str, hold_hours: i32) {
    let mut conn = pool.get().unwrap();
    let update = ListingUpdate {
        status: Some(LISTING_ACTIVE.to_string()),
        price_post_ton: Some(price_post.to_string()),
        formats_enabled: vec!["post".to_string()],
        hold_hours_post: Some(hold_hours),
        ..ListingUpdate::default()
    };
    admarket::models::ChannelListing::upsert(&mut conn, channel_id, &update).unwrap();
}

pub fn deal_status(pool: &DbPool, deal_id: &str) -> String {
    let mut conn = pool.get().unwrap();
    admarket::models::Deal::find(&mut conn, deal_id).unwrap().status
}

pub fn escrow_for(pool: &DbPool, deal_id: &str) -> admarket::models::EscrowLedger {
    let mut conn = pool.get().unwrap();
    admarket::models::EscrowLedger::find_by_deal(&mut conn, deal_id).unwrap()
}

/// Rewinds `deals.updated_at` so timeout sweeps see the deal as stale.
pub fn backdate_deal(pool: &DbPool, deal_id: &str, seconds: i64) {
    use admarket::schema::deals;
    let mut conn = pool.get().unwrap();
    let past = Utc::now().naive_utc() - chrono::Duration::seconds(seconds);
    diesel::update(deals::table.find(deal_id))
        .set(deals::updated_at.eq(past))
        .execute(&mut conn)
        .unwrap();
}

/// Rewinds `deal_posts.posted_at` so the hold period reads as elapsed.
pub fn backdate_post(pool: &DbPool, deal_id: &str, seconds: i64) {
    use admarket::schema::deal_posts;
    let mut conn = pool.get().unwrap();
    let past = Utc::now().naive_utc() - chrono::Duration::seconds(seconds);
    diesel::update(deal_posts::table.filter(deal_posts::deal_id.eq(deal_id)))
        .set(deal_posts::posted_at.eq(Some(past)))
        .execute(&mut conn)
        .unwrap();
}

// ---------------------------------------------------------------------------
// Scripted chain
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeChain {
    account: Mutex<AccountState>,
    txs: Mutex<Vec<ChainTx>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an inbound transfer and advances the account head.
    pub fn push_transfer(&self, lt: u64, from: &str, amount_nano: u128, memo: Option<&str>) {
        let mut txs = self.txs.lock().unwrap();
        let (prev_tx_lt, prev_tx_hash) = txs
            .last()
            .map(|tx: &ChainTx| (tx.lt, tx.hash.clone()))
            .unwrap_or((0, Vec::new()));

        let tx = ChainTx {
            lt,
            hash: lt.to_be_bytes().to_vec(),
            prev_tx_lt,
            prev_tx_hash,
            in_msg: Some(InboundTransfer {
                source: from.to_string(),
                amount_nano,
                bounced: false,
                body: memo.map(encode_comment).unwrap_or_default(),
            }),
        };
        txs.push(tx);

        let mut account = self.account.lock().unwrap();
        account.is_active = true;
        account.last_tx_lt = lt;
        account.last_tx_hash = lt.to_be_bytes().to_vec();
    }

    pub fn push_bounced(&self, lt: u64, from: &str, amount_nano: u128, memo: &str) {
        self.push_transfer(lt, from, amount_nano, Some(memo));
        let mut txs = self.txs.lock().unwrap();
        if let Some(tx) = txs.last_mut() {
            if let Some(msg) = tx.in_msg.as_mut() {
                msg.bounced = true;
            }
        }
    }
}

#[async_trait]
impl ChainApi for FakeChain {
    async fn account_state(&self, _address: &str) -> Result<AccountState> {
        Ok(self.account.lock().unwrap().clone())
    }

    async fn list_transactions(
        &self,
        _address: &str,
        lt: u64,
        _hash: &[u8],
        limit: u32,
    ) -> Result<Vec<ChainTx>> {
        // Oldest-first page ending at the requested lt.
        let txs = self.txs.lock().unwrap();
        let mut page: Vec<ChainTx> = txs.iter().filter(|tx| tx.lt <= lt).cloned().collect();
        page.sort_by_key(|tx| tx.lt);
        let skip = page.len().saturating_sub(limit as usize);
        Ok(page.into_iter().skip(skip).collect())
    }
}

// ---------------------------------------------------------------------------
// Canned page fetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakePostFetcher {
    response: Arc<Mutex<PostCheck>>,
}

impl FakePostFetcher {
    pub fn existing(text: &str) -> Self {
        Self {
            response: Arc::new(Mutex::new(PostCheck {
                exists: true,
                text: Some(text.to_string()),
            })),
        }
    }

    pub fn missing() -> Self {
        Self {
            response: Arc::new(Mutex::new(PostCheck {
                exists: false,
                text: None,
            })),
        }
    }

    pub fn set_text(&self, text: &str) {
        let mut response = self.response.lock().unwrap();
        response.exists = true;
        response.text = Some(text.to_string());
    }
}

#[async_trait]
impl PostFetcher for FakePostFetcher {
    async fn fetch_post(&self, _channel: &str, _message_id: i64) -> Result<PostCheck> {
        Ok(self.response.lock().unwrap().clone())
    }
}
