//! Public chat-page collaborator.
//!
//! The post monitor needs one answer per post: does it still exist, and
//! what does its text look like now. The production implementation fetches
//! the public t.me embed page; tests plug in a fake `PostFetcher`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct PostCheck {
    pub exists: bool,
    pub text: Option<String>,
}

#[async_trait]
pub trait PostFetcher: Send + Sync {
    async fn fetch_post(&self, channel_username: &str, message_id: i64) -> Result<PostCheck>;
}

pub struct TmePageClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

const MISSING_POST_MARKER: &str = "tgme_widget_message_error";
const TEXT_MARKER: &str = "tgme_widget_message_text";

impl TmePageClient {
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .build()
            .context("failed to build t.me HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }
}

#[async_trait]
impl PostFetcher for TmePageClient {
    async fn fetch_post(&self, channel_username: &str, message_id: i64) -> Result<PostCheck> {
        let url = format!("{}/{channel_username}/{message_id}?embed=1", self.base_url);

        let mut last_err = anyhow::anyhow!("no attempts made");
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.text().await.context("failed to read t.me page body")?;
                    return Ok(parse_embed_page(&body));
                }
                Ok(resp) => {
                    last_err = anyhow::anyhow!("HTTP {} for {url}", resp.status());
                }
                Err(e) => {
                    last_err = anyhow::Error::new(e).context(format!("GET {url} failed"));
                }
            }
        }
        Err(last_err)
    }
}

fn parse_embed_page(body: &str) -> PostCheck {
    if body.contains(MISSING_POST_MARKER) || !body.contains("tgme_widget_message") {
        return PostCheck {
            exists: false,
            text: None,
        };
    }
    PostCheck {
        exists: true,
        text: extract_message_text(body),
    }
}

/// Pulls the inner text of the message-text div, tags stripped. Best-effort:
/// a missing text block (media-only posts) is fine.
fn extract_message_text(body: &str) -> Option<String> {
    let start = body.find(TEXT_MARKER)?;
    let open_end = body[start..].find('>')? + start + 1;
    let close = body[open_end..].find("</div>")? + open_end;
    let inner = &body[open_end..close];

    let mut text = String::with_capacity(inner.len());
    let mut in_tag = false;
    for c in inner.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extracts the numeric message id from a `https://t.me/<channel>/<id>` URL.
pub fn message_id_from_url(post_url: &str) -> Option<i64> {
    post_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .split('?')
        .next()?
        .parse()
        .ok()
}
