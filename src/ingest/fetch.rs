// src/ingest/fetch.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;

use crate::ingest::parse::parse_feed;
use crate::ingest::types::{FeedFetcher, ParsedFeed};

pub const DEFAULT_USER_AGENT: &str = "feed-sentinel/0.1 (RSS client)";

/// Some hosts (reddit) reject non-browser clients outright.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// FEMA feeds are routinely slow to respond.
const SLOW_PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-request timeout for a feed URL.
pub fn timeout_for(url: &str) -> Duration {
    if url.contains("fema.gov") {
        SLOW_PROVIDER_TIMEOUT
    } else {
        DEFAULT_TIMEOUT
    }
}

/// User-Agent header for a feed URL.
pub fn user_agent_for(url: &str) -> &'static str {
    if url.contains("reddit.com") {
        BROWSER_USER_AGENT
    } else {
        DEFAULT_USER_AGENT
    }
}

/// Fetches feeds over HTTP with per-host timeout and User-Agent overrides.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent_for(url))
            .timeout(timeout_for(url))
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} non-2xx"))?;

        let bytes = resp.bytes().await.context("reading feed body")?;
        let body = String::from_utf8_lossy(&bytes);
        parse_feed(&body).with_context(|| format!("parsing feed {url}"))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Serves feed documents from memory, keyed by URL. Unknown URLs fail like a 404.
#[derive(Default)]
pub struct FixtureFetcher {
    docs: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: &str, xml: &str) -> Self {
        self.docs.insert(url.to_string(), xml.to_string());
        self
    }
}

#[async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let xml = self
            .docs
            .get(url)
            .ok_or_else(|| anyhow!("no fixture for {url}"))?;
        parse_feed(xml).with_context(|| format!("parsing fixture {url}"))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
