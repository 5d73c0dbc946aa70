//! Published-placement record, one row per deal.
//!
//! `upsert` merges field-by-field: an incoming `Some` overwrites, `None`
//! preserves whatever is already stored. The post monitor flips the
//! `is_deleted` / `is_edited` flags.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::deal_posts;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = deal_posts)]
pub struct DealPost {
    pub id: String,
    pub deal_id: String,
    pub telegram_message_id: Option<i64>,
    pub telegram_chat_id: Option<i64>,
    pub post_url: Option<String>,
    pub content_hash: Option<String>,
    pub posted_at: Option<NaiveDateTime>,
    pub last_checked_at: Option<NaiveDateTime>,
    pub is_deleted: bool,
    pub is_edited: bool,
}

#[derive(Insertable)]
#[diesel(table_name = deal_posts)]
struct NewPost<'a> {
    id: String,
    deal_id: &'a str,
    telegram_message_id: Option<i64>,
    telegram_chat_id: Option<i64>,
    post_url: Option<&'a str>,
    content_hash: Option<&'a str>,
    posted_at: Option<NaiveDateTime>,
    is_deleted: bool,
    is_edited: bool,
}

/// Incoming fields for `upsert`; `None` means "leave as-is".
#[derive(Debug, Default, Clone)]
pub struct PostPatch {
    pub telegram_message_id: Option<i64>,
    pub telegram_chat_id: Option<i64>,
    pub post_url: Option<String>,
    pub content_hash: Option<String>,
    pub posted_at: Option<NaiveDateTime>,
}

impl DealPost {
    pub fn find_by_deal(conn: &mut SqliteConnection, deal_id: &str) -> QueryResult<DealPost> {
        deal_posts::table
            .filter(deal_posts::deal_id.eq(deal_id))
            .first(conn)
    }

    pub fn upsert(conn: &mut SqliteConnection, deal_id: &str, patch: &PostPatch) -> QueryResult<DealPost> {
        let existing: Option<DealPost> = deal_posts::table
            .filter(deal_posts::deal_id.eq(deal_id))
            .first(conn)
            .optional()?;

        match existing {
            Some(post) => {
                diesel::update(deal_posts::table.find(&post.id))
                    .set((
                        deal_posts::telegram_message_id
                            .eq(patch.telegram_message_id.or(post.telegram_message_id)),
                        deal_posts::telegram_chat_id
                            .eq(patch.telegram_chat_id.or(post.telegram_chat_id)),
                        deal_posts::post_url.eq(patch.post_url.clone().or(post.post_url)),
                        deal_posts::content_hash
                            .eq(patch.content_hash.clone().or(post.content_hash)),
                        deal_posts::posted_at.eq(patch.posted_at.or(post.posted_at)),
                    ))
                    .execute(conn)?;
                deal_posts::table.find(&post.id).first(conn)
            }
            None => {
                let new_post = NewPost {
                    id: Uuid::new_v4().to_string(),
                    deal_id,
                    telegram_message_id: patch.telegram_message_id,
                    telegram_chat_id: patch.telegram_chat_id,
                    post_url: patch.post_url.as_deref(),
                    content_hash: patch.content_hash.as_deref(),
                    posted_at: patch.posted_at,
                    is_deleted: false,
                    is_edited: false,
                };
                diesel::insert_into(deal_posts::table)
                    .values(&new_post)
                    .execute(conn)?;
                deal_posts::table.find(&new_post.id).first(conn)
            }
        }
    }

    pub fn update_flags(
        conn: &mut SqliteConnection,
        deal_id: &str,
        is_deleted: bool,
        is_edited: bool,
    ) -> QueryResult<usize> {
        diesel::update(deal_posts::table.filter(deal_posts::deal_id.eq(deal_id)))
            .set((
                deal_posts::is_deleted.eq(is_deleted),
                deal_posts::is_edited.eq(is_edited),
                deal_posts::last_checked_at.eq(Some(Utc::now().naive_utc())),
            ))
            .execute(conn)
    }

    pub fn touch_checked(conn: &mut SqliteConnection, deal_id: &str) -> QueryResult<usize> {
        diesel::update(deal_posts::table.filter(deal_posts::deal_id.eq(deal_id)))
            .set(deal_posts::last_checked_at.eq(Some(Utc::now().naive_utc())))
            .execute(conn)
    }
}
