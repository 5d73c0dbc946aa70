//! Channel listing: the channel's offer to advertisers.
//!
//! Per-format prices and hold durations, an enabled-formats set stored as a
//! JSON array, and the auto-accept flag. One listing per channel.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::deal::{AD_FORMAT_POST, AD_FORMAT_REPOST, AD_FORMAT_STORY};
use crate::schema::channel_listings;

pub const LISTING_DRAFT: &str = "draft";
pub const LISTING_ACTIVE: &str = "active";
pub const LISTING_PAUSED: &str = "paused";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
#[diesel(table_name = channel_listings)]
pub struct ChannelListing {
    pub id: String,
    pub channel_id: String,
    pub status: String,
    pub price_post_ton: Option<String>,
    pub price_repost_ton: Option<String>,
    pub price_story_ton: Option<String>,
    pub formats_enabled: String,
    pub hold_hours_post: i32,
    pub hold_hours_repost: i32,
    pub hold_hours_story: i32,
    pub auto_accept: bool,
    pub min_lead_time_minutes: i32,
    pub category: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Listing fields as supplied by the channel owner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingUpdate {
    pub status: Option<String>,
    pub price_post_ton: Option<String>,
    pub price_repost_ton: Option<String>,
    pub price_story_ton: Option<String>,
    #[serde(default)]
    pub formats_enabled: Vec<String>,
    pub hold_hours_post: Option<i32>,
    pub hold_hours_repost: Option<i32>,
    pub hold_hours_story: Option<i32>,
    pub auto_accept: Option<bool>,
    pub min_lead_time_minutes: Option<i32>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = channel_listings)]
struct NewListing<'a> {
    id: String,
    channel_id: &'a str,
    status: &'a str,
    price_post_ton: Option<&'a str>,
    price_repost_ton: Option<&'a str>,
    price_story_ton: Option<&'a str>,
    formats_enabled: String,
    hold_hours_post: i32,
    hold_hours_repost: i32,
    hold_hours_story: i32,
    auto_accept: bool,
    min_lead_time_minutes: i32,
    category: Option<&'a str>,
    language: Option<&'a str>,
    description: Option<&'a str>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl ChannelListing {
    pub fn formats(&self) -> Vec<String> {
        serde_json::from_str(&self.formats_enabled).unwrap_or_default()
    }

    pub fn is_format_enabled(&self, format: &str) -> bool {
        self.formats().iter().any(|f| f == format)
    }

    pub fn price_for_format(&self, format: &str) -> Option<&str> {
        match format {
            AD_FORMAT_POST => self.price_post_ton.as_deref(),
            AD_FORMAT_REPOST => self.price_repost_ton.as_deref(),
            AD_FORMAT_STORY => self.price_story_ton.as_deref(),
            _ => None,
        }
    }

    pub fn hold_hours_for_format(&self, format: &str) -> i32 {
        match format {
            AD_FORMAT_REPOST => self.hold_hours_repost,
            AD_FORMAT_STORY => self.hold_hours_story,
            _ => self.hold_hours_post,
        }
    }

    pub fn get(conn: &mut SqliteConnection, channel_id: &str) -> QueryResult<ChannelListing> {
        channel_listings::table
            .filter(channel_listings::channel_id.eq(channel_id))
            .first(conn)
    }

    pub fn upsert(
        conn: &mut SqliteConnection,
        channel_id: &str,
        update: &ListingUpdate,
    ) -> QueryResult<ChannelListing> {
        let formats_json =
            serde_json::to_string(&update.formats_enabled).unwrap_or_else(|_| "[]".to_string());
        let now = Utc::now().naive_utc();

        let existing: Option<ChannelListing> = channel_listings::table
            .filter(channel_listings::channel_id.eq(channel_id))
            .first(conn)
            .optional()?;

        match existing {
            Some(listing) => {
                diesel::update(channel_listings::table.find(&listing.id))
                    .set((
                        channel_listings::status
                            .eq(update.status.clone().unwrap_or(listing.status)),
                        channel_listings::price_post_ton.eq(update.price_post_ton.clone()),
                        channel_listings::price_repost_ton.eq(update.price_repost_ton.clone()),
                        channel_listings::price_story_ton.eq(update.price_story_ton.clone()),
                        channel_listings::formats_enabled.eq(formats_json),
                        channel_listings::hold_hours_post.eq(update.hold_hours_post.unwrap_or(0)),
                        channel_listings::hold_hours_repost
                            .eq(update.hold_hours_repost.unwrap_or(0)),
                        channel_listings::hold_hours_story.eq(update.hold_hours_story.unwrap_or(0)),
                        channel_listings::auto_accept.eq(update.auto_accept.unwrap_or(false)),
                        channel_listings::min_lead_time_minutes
                            .eq(update.min_lead_time_minutes.unwrap_or(0)),
                        channel_listings::category.eq(update.category.clone()),
                        channel_listings::language.eq(update.language.clone()),
                        channel_listings::description.eq(update.description.clone()),
                        channel_listings::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                channel_listings::table.find(&listing.id).first(conn)
            }
            None => {
                let new_listing = NewListing {
                    id: Uuid::new_v4().to_string(),
                    channel_id,
                    status: update.status.as_deref().unwrap_or(LISTING_DRAFT),
                    price_post_ton: update.price_post_ton.as_deref(),
                    price_repost_ton: update.price_repost_ton.as_deref(),
                    price_story_ton: update.price_story_ton.as_deref(),
                    formats_enabled: formats_json,
                    hold_hours_post: update.hold_hours_post.unwrap_or(0),
                    hold_hours_repost: update.hold_hours_repost.unwrap_or(0),
                    hold_hours_story: update.hold_hours_story.unwrap_or(0),
                    auto_accept: update.auto_accept.unwrap_or(false),
                    min_lead_time_minutes: update.min_lead_time_minutes.unwrap_or(0),
                    category: update.category.as_deref(),
                    language: update.language.as_deref(),
                    description: update.description.as_deref(),
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(channel_listings::table)
                    .values(&new_listing)
                    .execute(conn)?;
                channel_listings::table.find(&new_listing.id).first(conn)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_with(formats: &str) -> ChannelListing {
        ChannelListing {
            id: "l1".into(),
            channel_id: "c1".into(),
            status: LISTING_ACTIVE.into(),
            price_post_ton: Some("5".into()),
            price_repost_ton: None,
            price_story_ton: Some("2.5".into()),
            formats_enabled: formats.into(),
            hold_hours_post: 24,
            hold_hours_repost: 0,
            hold_hours_story: 1,
            auto_accept: false,
            min_lead_time_minutes: 0,
            category: None,
            language: None,
            description: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn format_flags_come_from_json_array() {
        let listing = listing_with(r#"["post","story"]"#);
        assert!(listing.is_format_enabled("post"));
        assert!(listing.is_format_enabled("story"));
        assert!(!listing.is_format_enabled("repost"));
    }

    #[test]
    fn per_format_prices_and_hold() {
        let listing = listing_with("[]");
        assert_eq!(listing.price_for_format("post"), Some("5"));
        assert_eq!(listing.price_for_format("repost"), None);
        assert_eq!(listing.price_for_format("story"), Some("2.5"));
        assert_eq!(listing.hold_hours_for_format("post"), 24);
        assert_eq!(listing.hold_hours_for_format("story"), 1);
    }

    #[test]
    fn malformed_formats_json_disables_everything() {
        let listing = listing_with("not-json");
        assert!(listing.formats().is_empty());
    }
}
