//! Client for the internal bot side channel.
//!
//! The bot process owns everything that talks to Telegram as the bot:
//! admin checks, chat posting, notifications. This service only consumes
//! its small internal HTTP API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct AdminCheck {
    pub is_admin: bool,
    #[serde(default)]
    pub can_post_messages: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminInfo {
    pub telegram_user_id: i64,
    pub username: Option<String>,
    #[serde(default)]
    pub can_post_messages: bool,
}

#[async_trait]
pub trait BotApi: Send + Sync {
    /// Is this Telegram user an admin of the channel, and may they post?
    async fn check_admin(&self, channel_username: &str, telegram_user_id: i64)
        -> Result<AdminCheck>;

    async fn get_admins(&self, channel_username: &str) -> Result<Vec<AdminInfo>>;
}

pub struct BotClient {
    http: reqwest::Client,
    base_url: String,
}

impl BotClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build bot HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BotApi for BotClient {
    async fn check_admin(
        &self,
        channel_username: &str,
        telegram_user_id: i64,
    ) -> Result<AdminCheck> {
        let url = format!("{}/internal/check-admin", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "channel_username": channel_username,
                "telegram_user_id": telegram_user_id,
            }))
            .send()
            .await
            .context("bot check-admin request failed")?
            .error_for_status()
            .context("bot check-admin request rejected")?;
        resp.json().await.context("bot check-admin response is not valid JSON")
    }

    async fn get_admins(&self, channel_username: &str) -> Result<Vec<AdminInfo>> {
        let url = format!("{}/internal/admins", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("channel", channel_username)])
            .send()
            .await
            .context("bot admins request failed")?
            .error_for_status()
            .context("bot admins request rejected")?;
        resp.json().await.context("bot admins response is not valid JSON")
    }
}
