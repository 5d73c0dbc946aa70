//! Hot-wallet deposit indexer.
//!
//! A single-writer poller over the hot wallet's transaction history. Every
//! five seconds it compares the account head against a persisted
//! `(lt, hash)` cursor, pages backwards until the cursor is reached,
//! replays the new transactions oldest-first and advances the cursor.
//!
//! Funding is at-most-once twice over: the escrow update is guarded by
//! `status = 'awaiting'`, and each transaction gets a TTL'd idempotency key
//! so a replayed page cannot re-emit events.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::db::{with_conn, DbPool};
use crate::events::{Event, Publisher, EVENT_PAYMENT_RECEIVED, TOPIC_DEAL};
use crate::kv::KvStore;
use crate::models::deal::DEAL_FUNDED;
use crate::models::escrow::ESCROW_AWAITING;
use crate::models::{Deal, EscrowLedger};
use crate::ton::{extract_comment, format_nano_as_ton, parse_ton_to_nano, AccountState, ChainApi, ChainTx};

pub const CURSOR_LT_KEY: &str = "ton-indexer:cursor:lt";
pub const CURSOR_HASH_KEY: &str = "ton-indexer:cursor:hash";
pub const PROCESSED_KEY_PREFIX: &str = "ton-indexer:tx:";
pub const PROCESSED_TTL_SECS: u64 = 7 * 24 * 3600;
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
const TX_BATCH_SIZE: u32 = 100;

pub struct TonIndexer {
    chain: Arc<dyn ChainApi>,
    kv: Arc<dyn KvStore>,
    db: DbPool,
    publisher: Arc<dyn Publisher>,
    hot_wallet_address: String,
}

impl TonIndexer {
    pub fn new(
        chain: Arc<dyn ChainApi>,
        kv: Arc<dyn KvStore>,
        db: DbPool,
        publisher: Arc<dyn Publisher>,
        hot_wallet_address: String,
    ) -> Self {
        Self {
            chain,
            kv,
            db,
            publisher,
            hot_wallet_address,
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.init_cursor().await {
            warn!(error = %e, "cursor initialization failed, starting from 0");
        }

        let mut poll_timer = interval(POLL_INTERVAL);
        info!(hot_wallet = %self.hot_wallet_address, "indexer poll loop started");

        loop {
            tokio::select! {
                _ = poll_timer.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "poll cycle failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("indexer shutting down");
                    break;
                }
            }
        }
    }

    /// First-run initialization stores the account's current head so only
    /// strictly newer transactions are ever processed. An inactive account
    /// starts from zero.
    pub async fn init_cursor(&self) -> Result<()> {
        if let Some(existing) = self.kv.get(CURSOR_LT_KEY).await? {
            if !existing.is_empty() {
                info!(lt = %existing, "resuming from saved cursor");
                return Ok(());
            }
        }

        let account = match self.chain.account_state(&self.hot_wallet_address).await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "failed to read account for cursor init");
                self.kv.set(CURSOR_LT_KEY, "0").await?;
                return Ok(());
            }
        };

        if !account.is_active || account.last_tx_lt == 0 {
            info!("hot wallet not active yet, starting from lt=0");
            self.kv.set(CURSOR_LT_KEY, "0").await?;
            return Ok(());
        }

        self.save_cursor(account.last_tx_lt, &account.last_tx_hash)
            .await?;
        info!(
            lt = account.last_tx_lt,
            hash = %hex::encode(&account.last_tx_hash),
            "cursor initialized at current account head, historical transactions skipped"
        );
        Ok(())
    }

    /// One poll cycle: head check, backwards pagination, ascending replay,
    /// cursor advance.
    pub async fn poll_once(&self) -> Result<()> {
        let cursor_lt = self.load_cursor_lt().await;

        let account = self
            .chain
            .account_state(&self.hot_wallet_address)
            .await
            .context("get account state")?;

        if !account.is_active || account.last_tx_lt == 0 {
            return Ok(());
        }
        if account.last_tx_lt <= cursor_lt {
            return Ok(());
        }

        let new_txs = self
            .fetch_new_transactions(&account, cursor_lt)
            .await
            .context("fetch transactions")?;

        if !new_txs.is_empty() {
            info!(count = new_txs.len(), "found new transactions");
            for tx in &new_txs {
                self.process_tx(tx).await;
            }
        }

        self.save_cursor(account.last_tx_lt, &account.last_tx_hash)
            .await?;
        Ok(())
    }

    /// Pages backwards from the account head collecting everything with
    /// `lt > cursor_lt`, then returns the set in ascending order.
    async fn fetch_new_transactions(
        &self,
        account: &AccountState,
        cursor_lt: u64,
    ) -> Result<Vec<ChainTx>> {
        let mut collected = Vec::new();
        let mut lt = account.last_tx_lt;
        let mut hash = account.last_tx_hash.clone();

        loop {
            let page = self
                .chain
                .list_transactions(&self.hot_wallet_address, lt, &hash, TX_BATCH_SIZE)
                .await
                .with_context(|| format!("list transactions (lt={lt})"))?;
            if page.is_empty() {
                break;
            }

            let mut reached_cursor = false;
            for tx in &page {
                if tx.lt <= cursor_lt {
                    reached_cursor = true;
                    continue;
                }
                collected.push(tx.clone());
            }

            if reached_cursor || page.len() < TX_BATCH_SIZE as usize {
                break;
            }

            // Pages come oldest-first; the oldest entry points to the
            // previous page.
            let oldest = &page[0];
            if oldest.prev_tx_lt == 0 {
                break;
            }
            lt = oldest.prev_tx_lt;
            hash = oldest.prev_tx_hash.clone();
        }

        collected.sort_by_key(|tx| tx.lt);
        Ok(collected)
    }

    /// Handles a single inbound transfer: memo extraction, escrow match,
    /// amount verification, guarded funding. Processing failures never
    /// abort the cycle; unmarked transactions are retried next poll.
    async fn process_tx(&self, tx: &ChainTx) {
        let Some(ref in_msg) = tx.in_msg else {
            return;
        };
        if in_msg.bounced || in_msg.amount_nano == 0 {
            return;
        }

        let Some(memo) = extract_comment(&in_msg.body) else {
            debug!(lt = tx.lt, from = %in_msg.source, "transfer without memo, skipping");
            return;
        };

        let tx_key = format!("{PROCESSED_KEY_PREFIX}{}", tx.lt);
        match self.kv.exists(&tx_key).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                warn!(lt = tx.lt, error = %e, "idempotency check failed, skipping tx this cycle");
                return;
            }
        }

        info!(
            lt = tx.lt,
            from = %in_msg.source,
            amount = %format_nano_as_ton(in_msg.amount_nano),
            memo = %memo,
            "incoming payment detected"
        );

        let memo_owned = memo.clone();
        let escrow = match with_conn(&self.db, move |conn| {
            use diesel::OptionalExtension;
            EscrowLedger::find_by_memo(conn, &memo_owned).optional()
        })
        .await
        {
            Ok(Some(escrow)) => escrow,
            Ok(None) => {
                debug!(memo = %memo, "no escrow found for memo");
                self.mark_processed(&tx_key, "no_escrow").await;
                return;
            }
            Err(e) => {
                error!(memo = %memo, error = %e, "escrow lookup failed");
                return;
            }
        };

        if escrow.status != ESCROW_AWAITING {
            debug!(
                memo = %memo,
                deal_id = %escrow.deal_id,
                status = %escrow.status,
                "escrow not awaiting payment"
            );
            self.mark_processed(&tx_key, &format!("skip:{}", escrow.status))
                .await;
            return;
        }

        let expected_nano = match parse_ton_to_nano(&escrow.deposit_expected_ton) {
            Ok(n) => n,
            Err(e) => {
                error!(
                    deal_id = %escrow.deal_id,
                    expected = %escrow.deposit_expected_ton,
                    error = %e,
                    "invalid expected amount in escrow"
                );
                return;
            }
        };

        if in_msg.amount_nano < expected_nano {
            // Left unmarked on purpose: the payer may top up with a later,
            // full-size transfer which will be compared afresh.
            warn!(
                deal_id = %escrow.deal_id,
                received = %format_nano_as_ton(in_msg.amount_nano),
                expected = %escrow.deposit_expected_ton,
                memo = %memo,
                "insufficient payment, below expected amount"
            );
            return;
        }

        let tx_ref = tx.lt.to_string();
        let payer = in_msg.source.clone();
        let deal_id = escrow.deal_id.clone();
        let funded = match with_conn(&self.db, move |conn| {
            let n = EscrowLedger::mark_funded(conn, &deal_id, &tx_ref, &payer)?;
            if n > 0 {
                Deal::update_status(conn, &deal_id, DEAL_FUNDED)?;
            }
            Ok(n)
        })
        .await
        {
            Ok(n) => n,
            Err(e) => {
                error!(deal_id = %escrow.deal_id, error = %e, "failed to mark escrow funded");
                return;
            }
        };

        if funded == 0 {
            // Lost a race against another cycle; the skip path will mark the
            // key next time around.
            return;
        }

        let event = Event::new(
            EVENT_PAYMENT_RECEIVED,
            json!({
                "deal_id": escrow.deal_id,
                "tx_lt": tx.lt,
                "amount_ton": format_nano_as_ton(in_msg.amount_nano),
                "from": in_msg.source,
                "memo": memo,
            }),
        );
        if let Err(e) = self.publisher.publish(TOPIC_DEAL, event).await {
            warn!(deal_id = %escrow.deal_id, error = %e, "payment event publish failed");
        }

        self.mark_processed(&tx_key, &format!("funded:{}", escrow.deal_id))
            .await;

        info!(
            deal_id = %escrow.deal_id,
            tx_lt = tx.lt,
            amount = %format_nano_as_ton(in_msg.amount_nano),
            from = %in_msg.source,
            "payment processed, deal funded"
        );
    }

    async fn mark_processed(&self, tx_key: &str, value: &str) {
        if let Err(e) = self.kv.set_ex(tx_key, value, PROCESSED_TTL_SECS).await {
            warn!(key = %tx_key, error = %e, "failed to mark tx processed");
        }
    }

    async fn load_cursor_lt(&self) -> u64 {
        match self.kv.get(CURSOR_LT_KEY).await {
            Ok(Some(value)) => value.parse().unwrap_or(0),
            _ => 0,
        }
    }

    async fn save_cursor(&self, lt: u64, hash: &[u8]) -> Result<()> {
        self.kv.set(CURSOR_LT_KEY, &lt.to_string()).await?;
        self.kv.set(CURSOR_HASH_KEY, &hex::encode(hash)).await?;
        Ok(())
    }
}
