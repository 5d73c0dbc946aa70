//! Append-only audit log. The durable record of everything that happened;
//! events on the bus are best-effort, this table is not.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::audit_log;

pub const ACTOR_USER: &str = "user";
pub const ACTOR_ADMIN: &str = "admin";
pub const ACTOR_SYSTEM: &str = "system";
pub const ACTOR_BOT: &str = "bot";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = audit_log)]
pub struct AuditEntry {
    pub id: String,
    pub actor_user_id: Option<String>,
    pub actor_type: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub meta: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = audit_log)]
pub struct NewAuditEntry {
    pub id: String,
    pub actor_user_id: Option<String>,
    pub actor_type: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub meta: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewAuditEntry {
    pub fn new(
        actor_user_id: Option<&str>,
        actor_type: &str,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        meta: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_user_id: actor_user_id.map(str::to_string),
            actor_type: actor_type.to_string(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(str::to_string),
            meta: meta.map(|m| m.to_string()),
            created_at: Utc::now().naive_utc(),
        }
    }
}

impl AuditEntry {
    pub fn append(conn: &mut SqliteConnection, entry: &NewAuditEntry) -> QueryResult<usize> {
        diesel::insert_into(audit_log::table)
            .values(entry)
            .execute(conn)
    }

    pub fn by_entity(
        conn: &mut SqliteConnection,
        entity_type: &str,
        entity_id: &str,
        limit: i64,
        offset: i64,
    ) -> QueryResult<Vec<AuditEntry>> {
        let limit = if limit <= 0 { 50 } else { limit };
        audit_log::table
            .filter(audit_log::entity_type.eq(entity_type))
            .filter(audit_log::entity_id.eq(entity_id))
            .order(audit_log::created_at.desc())
            .limit(limit)
            .offset(offset.max(0))
            .load(conn)
    }
}
