//! Environment-driven configuration for the API server, workers and indexer.
//!
//! All knobs come from the process environment (a `.env` file is honoured in
//! development). `Config::from_env()` never fails: every variable has a
//! fallback so a bare checkout starts against local Postgres-less defaults.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: String,
    pub redis_url: String,

    // Bot side channel
    pub bot_token: String,
    pub bot_internal_url: String,

    // TON
    pub ton_hot_wallet_address: String,
    pub ton_network: String,
    pub ton_api_base_url: String,
    pub ton_proof_allowed_domains: Vec<String>,

    // Platform economics
    pub platform_fee_bps: i32,
    pub hold_period_seconds: i32,

    // Deal timeouts (seconds)
    pub deal_timeout_submitted_secs: i64,
    pub deal_timeout_payment_secs: i64,
    pub deal_timeout_creative_secs: i64,

    // Auth
    pub token_secret: String,
    pub token_ttl: Duration,
    pub init_data_max_age: Duration,

    // t.me page fetching
    pub tme_fetch_timeout: Duration,
    pub tme_fetch_max_retries: u32,

    // Admin
    pub admin_telegram_ids: Vec<i64>,

    // Server
    pub api_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            database_url: get_env("DATABASE_URL", "admarket.db"),
            redis_url: get_env("REDIS_URL", "redis://127.0.0.1:6379"),

            bot_token: get_env("BOT_TOKEN", ""),
            bot_internal_url: get_env("BOT_INTERNAL_URL", "http://localhost:8081"),

            ton_hot_wallet_address: get_env("TON_HOT_WALLET_ADDRESS", ""),
            ton_network: get_env("TON_NETWORK", "testnet"),
            ton_api_base_url: get_env("TON_API_BASE_URL", "https://testnet.toncenter.com"),
            ton_proof_allowed_domains: parse_list(&get_env("TON_PROOF_ALLOWED_DOMAINS", "")),

            platform_fee_bps: get_env_parsed("PLATFORM_FEE_BPS", 300),
            hold_period_seconds: get_env_parsed("HOLD_PERIOD_SECONDS", 3600),

            deal_timeout_submitted_secs: get_env_parsed("DEAL_TIMEOUT_SUBMITTED_SECONDS", 86_400),
            deal_timeout_payment_secs: get_env_parsed("DEAL_TIMEOUT_PAYMENT_SECONDS", 3_600),
            deal_timeout_creative_secs: get_env_parsed("DEAL_TIMEOUT_CREATIVE_SECONDS", 172_800),

            token_secret: get_env("TOKEN_SECRET", "change-me-in-production"),
            token_ttl: Duration::from_secs(get_env_parsed::<u64>("TOKEN_TTL_HOURS", 24) * 3600),
            init_data_max_age: Duration::from_secs(get_env_parsed(
                "INIT_DATA_MAX_AGE_SECONDS",
                300,
            )),

            tme_fetch_timeout: Duration::from_millis(get_env_parsed("TME_FETCH_TIMEOUT_MS", 10_000)),
            tme_fetch_max_retries: get_env_parsed("TME_FETCH_MAX_RETRIES", 3),

            admin_telegram_ids: parse_id_list(&get_env("ADMIN_TELEGRAM_IDS", "")),

            api_addr: get_env("API_ADDR", "0.0.0.0:3000"),
        }
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_telegram_ids.contains(&telegram_id)
    }

    /// Startup sanity warnings. Nothing here is fatal; production deploys
    /// are expected to override the defaults.
    pub fn warn_on_defaults(&self) {
        if self.bot_token.is_empty() {
            tracing::warn!("BOT_TOKEN is not set, Telegram auth will reject every login");
        }
        if self.token_secret == "change-me-in-production" {
            tracing::warn!("TOKEN_SECRET is the default value, change it in production");
        }
        if self.ton_hot_wallet_address.is_empty() {
            tracing::warn!("TON_HOT_WALLET_ADDRESS is not set, escrow deposits cannot be matched");
        }
    }
}

fn get_env(key: &str, fallback: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn get_env_parsed<T: std::str::FromStr + Copy>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_id_list(s: &str) -> Vec<i64> {
    s.split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" app.example.com, ads.example.com ,,"),
            vec!["app.example.com".to_string(), "ads.example.com".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn parse_id_list_ignores_garbage() {
        assert_eq!(parse_id_list("123, abc, 456"), vec![123, 456]);
    }
}
