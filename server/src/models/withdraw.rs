//! Per-channel withdrawal destination, owner-bound.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::withdraw_wallets;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = withdraw_wallets)]
pub struct WithdrawWallet {
    pub id: String,
    pub channel_id: String,
    pub owner_user_id: String,
    pub wallet_address: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = withdraw_wallets)]
struct NewWithdrawWallet<'a> {
    id: String,
    channel_id: &'a str,
    owner_user_id: &'a str,
    wallet_address: &'a str,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl WithdrawWallet {
    pub fn upsert(
        conn: &mut SqliteConnection,
        channel_id: &str,
        owner_user_id: &str,
        wallet_address: &str,
    ) -> QueryResult<WithdrawWallet> {
        let now = Utc::now().naive_utc();
        let existing: Option<WithdrawWallet> = withdraw_wallets::table
            .filter(withdraw_wallets::channel_id.eq(channel_id))
            .first(conn)
            .optional()?;

        match existing {
            Some(row) => {
                diesel::update(withdraw_wallets::table.find(&row.id))
                    .set((
                        withdraw_wallets::owner_user_id.eq(owner_user_id),
                        withdraw_wallets::wallet_address.eq(wallet_address),
                        withdraw_wallets::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                withdraw_wallets::table.find(&row.id).first(conn)
            }
            None => {
                let new_wallet = NewWithdrawWallet {
                    id: Uuid::new_v4().to_string(),
                    channel_id,
                    owner_user_id,
                    wallet_address,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(withdraw_wallets::table)
                    .values(&new_wallet)
                    .execute(conn)?;
                withdraw_wallets::table.find(&new_wallet.id).first(conn)
            }
        }
    }

    pub fn by_channel(conn: &mut SqliteConnection, channel_id: &str) -> QueryResult<WithdrawWallet> {
        withdraw_wallets::table
            .filter(withdraw_wallets::channel_id.eq(channel_id))
            .first(conn)
    }
}
