//! Escrow ledger: one memo-addressed deposit record per deal.
//!
//! The ledger row is the serialization point for payment. `mark_funded`,
//! `mark_released` and `mark_refunded` are guarded by the prior status and
//! report the affected-row count; callers treat zero rows as a benign
//! already-done, never as an error.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::escrow_ledger;

pub const ESCROW_AWAITING: &str = "awaiting";
pub const ESCROW_FUNDED: &str = "funded";
pub const ESCROW_RELEASED: &str = "released";
pub const ESCROW_REFUNDED: &str = "refunded";

/// Placeholder tx reference until the external signer performs the send.
pub const TX_REF_PENDING_SEND: &str = "pending_send";

pub fn deposit_memo(deal_id: &str) -> String {
    format!("deal:{deal_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = escrow_ledger)]
pub struct EscrowLedger {
    pub id: String,
    pub deal_id: String,
    pub deposit_expected_ton: String,
    pub deposit_address: String,
    pub deposit_memo: String,
    pub status: String,
    pub funded_at: Option<NaiveDateTime>,
    pub funding_tx_hash: Option<String>,
    pub payer_address: Option<String>,
    pub release_amount_ton: Option<String>,
    pub release_tx_hash: Option<String>,
    pub refunded_at: Option<NaiveDateTime>,
    pub refund_tx_hash: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = escrow_ledger)]
pub struct NewEscrow {
    pub id: String,
    pub deal_id: String,
    pub deposit_expected_ton: String,
    pub deposit_address: String,
    pub deposit_memo: String,
    pub status: String,
}

impl NewEscrow {
    pub fn awaiting(deal_id: &str, expected_ton: &str, deposit_address: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            deal_id: deal_id.to_string(),
            deposit_expected_ton: expected_ton.to_string(),
            deposit_address: deposit_address.to_string(),
            deposit_memo: deposit_memo(deal_id),
            status: ESCROW_AWAITING.to_string(),
        }
    }
}

impl EscrowLedger {
    /// Insert-only. A duplicate memo (or second escrow for the same deal)
    /// surfaces as a unique violation.
    pub fn create(conn: &mut SqliteConnection, new_escrow: &NewEscrow) -> QueryResult<EscrowLedger> {
        diesel::insert_into(escrow_ledger::table)
            .values(new_escrow)
            .execute(conn)?;
        escrow_ledger::table.find(&new_escrow.id).first(conn)
    }

    pub fn find_by_deal(conn: &mut SqliteConnection, deal_id: &str) -> QueryResult<EscrowLedger> {
        escrow_ledger::table
            .filter(escrow_ledger::deal_id.eq(deal_id))
            .first(conn)
    }

    pub fn find_by_memo(conn: &mut SqliteConnection, memo: &str) -> QueryResult<EscrowLedger> {
        escrow_ledger::table
            .filter(escrow_ledger::deposit_memo.eq(memo))
            .first(conn)
    }

    /// `awaiting → funded`, at most once.
    pub fn mark_funded(
        conn: &mut SqliteConnection,
        deal_id: &str,
        funding_tx_hash: &str,
        payer_address: &str,
    ) -> QueryResult<usize> {
        diesel::update(
            escrow_ledger::table
                .filter(escrow_ledger::deal_id.eq(deal_id))
                .filter(escrow_ledger::status.eq(ESCROW_AWAITING)),
        )
        .set((
            escrow_ledger::status.eq(ESCROW_FUNDED),
            escrow_ledger::funded_at.eq(Some(Utc::now().naive_utc())),
            escrow_ledger::funding_tx_hash.eq(Some(funding_tx_hash)),
            escrow_ledger::payer_address.eq(Some(payer_address)),
        ))
        .execute(conn)
    }

    /// `funded → released`, at most once.
    pub fn mark_released(
        conn: &mut SqliteConnection,
        deal_id: &str,
        release_amount_ton: &str,
        release_tx_hash: &str,
    ) -> QueryResult<usize> {
        diesel::update(
            escrow_ledger::table
                .filter(escrow_ledger::deal_id.eq(deal_id))
                .filter(escrow_ledger::status.eq(ESCROW_FUNDED)),
        )
        .set((
            escrow_ledger::status.eq(ESCROW_RELEASED),
            escrow_ledger::release_amount_ton.eq(Some(release_amount_ton)),
            escrow_ledger::release_tx_hash.eq(Some(release_tx_hash)),
        ))
        .execute(conn)
    }

    /// Terminal refund; valid from `awaiting` or `funded`.
    pub fn mark_refunded(
        conn: &mut SqliteConnection,
        deal_id: &str,
        refund_tx_hash: &str,
    ) -> QueryResult<usize> {
        diesel::update(
            escrow_ledger::table
                .filter(escrow_ledger::deal_id.eq(deal_id))
                .filter(escrow_ledger::status.eq_any([ESCROW_AWAITING, ESCROW_FUNDED])),
        )
        .set((
            escrow_ledger::status.eq(ESCROW_REFUNDED),
            escrow_ledger::refunded_at.eq(Some(Utc::now().naive_utc())),
            escrow_ledger::refund_tx_hash.eq(Some(refund_tx_hash)),
        ))
        .execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_format() {
        assert_eq!(
            deposit_memo("0f8e2a"),
            "deal:0f8e2a".to_string()
        );
    }
}
