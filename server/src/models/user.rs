//! Marketplace users. Created on first Telegram login, never destroyed.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::users;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub telegram_user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub wallet_address: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_active_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    id: String,
    telegram_user_id: i64,
    username: Option<&'a str>,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    created_at: NaiveDateTime,
    last_active_at: NaiveDateTime,
}

impl User {
    /// Login upsert: fresh profile fields overwrite, missing ones preserve,
    /// `last_active_at` always advances.
    pub fn upsert_by_telegram_id(
        conn: &mut SqliteConnection,
        telegram_user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> QueryResult<User> {
        let existing: Option<User> = users::table
            .filter(users::telegram_user_id.eq(telegram_user_id))
            .first(conn)
            .optional()?;

        let now = Utc::now().naive_utc();
        match existing {
            Some(user) => {
                diesel::update(users::table.find(&user.id))
                    .set((
                        users::username.eq(username
                            .map(str::to_string)
                            .or(user.username.clone())),
                        users::first_name.eq(first_name
                            .map(str::to_string)
                            .or(user.first_name.clone())),
                        users::last_name.eq(last_name
                            .map(str::to_string)
                            .or(user.last_name.clone())),
                        users::last_active_at.eq(now),
                    ))
                    .execute(conn)?;
                users::table.find(&user.id).first(conn)
            }
            None => {
                let new_user = NewUser {
                    id: Uuid::new_v4().to_string(),
                    telegram_user_id,
                    username,
                    first_name,
                    last_name,
                    created_at: now,
                    last_active_at: now,
                };
                diesel::insert_into(users::table)
                    .values(&new_user)
                    .execute(conn)?;
                users::table.find(&new_user.id).first(conn)
            }
        }
    }

    pub fn find(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<User> {
        users::table.find(user_id).first(conn)
    }

    pub fn find_by_telegram_id(
        conn: &mut SqliteConnection,
        telegram_user_id: i64,
    ) -> QueryResult<User> {
        users::table
            .filter(users::telegram_user_id.eq(telegram_user_id))
            .first(conn)
    }

    pub fn touch(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<usize> {
        diesel::update(users::table.find(user_id))
            .set(users::last_active_at.eq(Utc::now().naive_utc()))
            .execute(conn)
    }

    pub fn set_wallet_address(
        conn: &mut SqliteConnection,
        user_id: &str,
        address: Option<&str>,
    ) -> QueryResult<usize> {
        diesel::update(users::table.find(user_id))
            .set(users::wallet_address.eq(address))
            .execute(conn)
    }
}
