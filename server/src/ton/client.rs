//! Chain access abstraction and its HTTP implementation.
//!
//! The indexer only ever needs two calls: the account's current head
//! `(last_tx_lt, last_tx_hash)` and a page of its transaction history from a
//! given cursor. `ChainApi` captures that contract; tests plug in a fake,
//! production uses `TonHttpClient` against a toncenter-style JSON API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::ton::comment::encode_comment;

#[derive(Debug, Clone, Default)]
pub struct AccountState {
    pub is_active: bool,
    pub last_tx_lt: u64,
    pub last_tx_hash: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct InboundTransfer {
    pub source: String,
    pub amount_nano: u128,
    pub bounced: bool,
    /// Raw message body: 32-bit opcode followed by payload bytes.
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ChainTx {
    pub lt: u64,
    pub hash: Vec<u8>,
    pub prev_tx_lt: u64,
    pub prev_tx_hash: Vec<u8>,
    pub in_msg: Option<InboundTransfer>,
}

#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn account_state(&self, address: &str) -> Result<AccountState>;

    /// Returns up to `limit` transactions ending at `(lt, hash)`, newest
    /// last. The page starting point walks backwards via `prev_tx_lt`.
    async fn list_transactions(
        &self,
        address: &str,
        lt: u64,
        hash: &[u8],
        limit: u32,
    ) -> Result<Vec<ChainTx>>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct TonHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl TonHttpClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to build TON HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct AccountInfoDto {
    #[serde(default)]
    state: String,
    last_transaction_id: Option<TxIdDto>,
}

#[derive(Deserialize)]
struct TxIdDto {
    lt: String,
    hash: String,
}

#[derive(Deserialize)]
struct TxDto {
    transaction_id: TxIdDto,
    prev_trans_id: Option<TxIdDto>,
    in_msg: Option<InMsgDto>,
}

#[derive(Deserialize)]
struct InMsgDto {
    #[serde(default)]
    source: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    bounced: bool,
    /// Decoded text comment, present for plain-text transfers.
    message: Option<String>,
}

fn parse_tx_id(id: &TxIdDto) -> Result<(u64, Vec<u8>)> {
    let lt = id.lt.parse::<u64>().context("bad lt in transaction id")?;
    let hash = BASE64
        .decode(&id.hash)
        .context("bad hash in transaction id")?;
    Ok((lt, hash))
}

impl TxDto {
    fn into_chain_tx(self) -> Result<ChainTx> {
        let (lt, hash) = parse_tx_id(&self.transaction_id)?;
        let (prev_tx_lt, prev_tx_hash) = match self.prev_trans_id {
            Some(ref id) => parse_tx_id(id)?,
            None => (0, Vec::new()),
        };
        let in_msg = self.in_msg.and_then(|m| {
            if m.source.is_empty() {
                // External message (e.g. our own outgoing wallet op), not a transfer.
                return None;
            }
            let amount_nano = m.value.parse::<u128>().ok()?;
            Some(InboundTransfer {
                source: m.source,
                amount_nano,
                bounced: m.bounced,
                body: m.message.as_deref().map(encode_comment).unwrap_or_default(),
            })
        });
        Ok(ChainTx {
            lt,
            hash,
            prev_tx_lt,
            prev_tx_hash,
            in_msg,
        })
    }
}

#[async_trait]
impl ChainApi for TonHttpClient {
    async fn account_state(&self, address: &str) -> Result<AccountState> {
        let url = format!("{}/api/v2/getAddressInformation", self.base_url);
        let resp: Envelope<AccountInfoDto> = self
            .http
            .get(&url)
            .query(&[("address", address)])
            .send()
            .await
            .context("account state request failed")?
            .error_for_status()
            .context("account state request rejected")?
            .json()
            .await
            .context("account state response is not valid JSON")?;

        let info = match (resp.ok, resp.result) {
            (true, Some(info)) => info,
            _ => anyhow::bail!(
                "account state error: {}",
                resp.error.unwrap_or_else(|| "unknown".to_string())
            ),
        };

        let (last_tx_lt, last_tx_hash) = match info.last_transaction_id {
            Some(ref id) => parse_tx_id(id)?,
            None => (0, Vec::new()),
        };

        Ok(AccountState {
            is_active: info.state == "active",
            last_tx_lt,
            last_tx_hash,
        })
    }

    async fn list_transactions(
        &self,
        address: &str,
        lt: u64,
        hash: &[u8],
        limit: u32,
    ) -> Result<Vec<ChainTx>> {
        let url = format!("{}/api/v2/getTransactions", self.base_url);
        let resp: Envelope<Vec<TxDto>> = self
            .http
            .get(&url)
            .query(&[
                ("address", address.to_string()),
                ("lt", lt.to_string()),
                ("hash", BASE64.encode(hash)),
                ("limit", limit.to_string()),
                ("archival", "true".to_string()),
            ])
            .send()
            .await
            .context("transaction list request failed")?
            .error_for_status()
            .context("transaction list request rejected")?
            .json()
            .await
            .context("transaction list response is not valid JSON")?;

        let txs = match (resp.ok, resp.result) {
            (true, Some(txs)) => txs,
            _ => anyhow::bail!(
                "transaction list error: {}",
                resp.error.unwrap_or_else(|| "unknown".to_string())
            ),
        };

        txs.into_iter().map(TxDto::into_chain_tx).collect()
    }
}
