//! Channels, membership and stats snapshots.
//!
//! Handles are stored normalized (lowercase, `@` and t.me prefixes
//! stripped). A channel carries at most three members: one owner and up to
//! two managers, enforced at the service layer against `count_members`.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{channel_members, channel_stats_snapshots, channels};

pub const BOT_STATUS_PENDING: &str = "pending";
pub const BOT_STATUS_ACTIVE: &str = "active";
pub const BOT_STATUS_REMOVED: &str = "removed";

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_MANAGER: &str = "manager";

pub const MAX_CHANNEL_MEMBERS: i64 = 3;

pub fn is_valid_member_role(role: &str) -> bool {
    role == ROLE_OWNER || role == ROLE_MANAGER
}

/// Lowercases and strips `@` / t.me prefixes from a channel handle.
pub fn normalize_username(raw: &str) -> String {
    let u = raw.trim();
    let u = u.strip_prefix("https://t.me/").unwrap_or(u);
    let u = u.strip_prefix("http://t.me/").unwrap_or(u);
    let u = u.strip_prefix('@').unwrap_or(u);
    u.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = channels)]
pub struct Channel {
    pub id: String,
    pub telegram_chat_id: Option<i64>,
    pub username: String,
    pub title: Option<String>,
    pub added_by_user_id: Option<String>,
    pub bot_status: String,
    pub userbot_status: String,
    pub bot_added_at: Option<NaiveDateTime>,
    pub bot_removed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = channels)]
pub struct NewChannel {
    pub id: String,
    pub username: String,
    pub added_by_user_id: Option<String>,
    pub bot_status: String,
    pub userbot_status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewChannel {
    pub fn pending(username: &str, added_by_user_id: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            added_by_user_id: Some(added_by_user_id.to_string()),
            bot_status: BOT_STATUS_PENDING.to_string(),
            userbot_status: "none".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = channel_members)]
pub struct ChannelMember {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub role: String,
    pub can_post: bool,
    pub last_admin_check_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = channel_members)]
pub struct NewChannelMember {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub role: String,
    pub can_post: bool,
    pub last_admin_check_at: Option<NaiveDateTime>,
}

impl NewChannelMember {
    pub fn new(channel_id: &str, user_id: &str, role: &str, can_post: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            can_post,
            last_admin_check_at: Some(Utc::now().naive_utc()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = channel_stats_snapshots)]
pub struct StatsSnapshot {
    pub id: String,
    pub channel_id: String,
    pub fetched_at: NaiveDateTime,
    pub subscribers: Option<i32>,
    pub avg_views: Option<i32>,
    pub er_percent: Option<f64>,
    pub source: String,
}

#[derive(Debug, Default, Clone)]
pub struct ChannelFilter {
    pub query: Option<String>,
    pub bot_status: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Channel {
    pub fn create(conn: &mut SqliteConnection, new_channel: &NewChannel) -> QueryResult<Channel> {
        diesel::insert_into(channels::table)
            .values(new_channel)
            .execute(conn)?;
        channels::table.find(&new_channel.id).first(conn)
    }

    pub fn find(conn: &mut SqliteConnection, channel_id: &str) -> QueryResult<Channel> {
        channels::table.find(channel_id).first(conn)
    }

    pub fn find_by_username(conn: &mut SqliteConnection, username: &str) -> QueryResult<Channel> {
        channels::table
            .filter(channels::username.eq(username))
            .first(conn)
    }

    pub fn search(conn: &mut SqliteConnection, filter: &ChannelFilter) -> QueryResult<Vec<Channel>> {
        let mut query = channels::table.into_boxed();
        if let Some(ref q) = filter.query {
            query = query.filter(channels::username.like(format!("%{}%", q.to_lowercase())));
        }
        if let Some(ref status) = filter.bot_status {
            query = query.filter(channels::bot_status.eq(status.clone()));
        }
        let limit = match filter.limit {
            n if n <= 0 || n > 100 => 20,
            n => n,
        };
        query
            .order(channels::created_at.desc())
            .limit(limit)
            .offset(filter.offset.max(0))
            .load(conn)
    }

    /// Channels where the user is owner or manager.
    pub fn by_member(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<Vec<Channel>> {
        let member_channels = channel_members::table
            .filter(channel_members::user_id.eq(user_id))
            .select(channel_members::channel_id);
        channels::table
            .filter(channels::id.eq_any(member_channels))
            .order(channels::created_at.desc())
            .load(conn)
    }

    pub fn update_bot_status(
        conn: &mut SqliteConnection,
        channel_id: &str,
        bot_status: &str,
    ) -> QueryResult<usize> {
        diesel::update(channels::table.find(channel_id))
            .set((
                channels::bot_status.eq(bot_status),
                channels::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
    }
}

impl ChannelMember {
    pub fn add(conn: &mut SqliteConnection, member: &NewChannelMember) -> QueryResult<ChannelMember> {
        diesel::insert_into(channel_members::table)
            .values(member)
            .execute(conn)?;
        channel_members::table.find(&member.id).first(conn)
    }

    pub fn for_channel(
        conn: &mut SqliteConnection,
        channel_id: &str,
    ) -> QueryResult<Vec<ChannelMember>> {
        channel_members::table
            .filter(channel_members::channel_id.eq(channel_id))
            .load(conn)
    }

    pub fn count_for_channel(conn: &mut SqliteConnection, channel_id: &str) -> QueryResult<i64> {
        channel_members::table
            .filter(channel_members::channel_id.eq(channel_id))
            .count()
            .get_result(conn)
    }

    pub fn find(
        conn: &mut SqliteConnection,
        channel_id: &str,
        user_id: &str,
    ) -> QueryResult<ChannelMember> {
        channel_members::table
            .filter(channel_members::channel_id.eq(channel_id))
            .filter(channel_members::user_id.eq(user_id))
            .first(conn)
    }
}

impl StatsSnapshot {
    pub fn latest(conn: &mut SqliteConnection, channel_id: &str) -> QueryResult<StatsSnapshot> {
        channel_stats_snapshots::table
            .filter(channel_stats_snapshots::channel_id.eq(channel_id))
            .order(channel_stats_snapshots::fetched_at.desc())
            .first(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_normalization() {
        assert_eq!(normalize_username("@Demo"), "demo");
        assert_eq!(normalize_username("https://t.me/DemoChannel"), "demochannel");
        assert_eq!(normalize_username("http://t.me/@abc"), "abc");
        assert_eq!(normalize_username("  Plain  "), "plain");
    }

    #[test]
    fn member_roles() {
        assert!(is_valid_member_role("owner"));
        assert!(is_valid_member_role("manager"));
        assert!(!is_valid_member_role("admin"));
        assert!(!is_valid_member_role(""));
    }
}
