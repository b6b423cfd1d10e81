use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde::Deserialize;

use crate::error::RelayError;
use crate::ingest::normalize_title;
use crate::ingest::types::{ContentSource, Item};

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    title: Option<String>,
    created_utc: Option<f64>,
    permalink: Option<String>,
    subreddit: Option<String>,
}

/// Parse a `/new.json` listing body into items, keeping the listing's
/// newest-first order. Entries without a timestamp or permalink are dropped.
pub fn parse_listing(body: &str) -> Result<Vec<Item>> {
    let listing: Listing = serde_json::from_str(body).context("parsing reddit listing json")?;

    let mut out = Vec::with_capacity(listing.data.children.len());
    for child in listing.data.children {
        let sub = child.data;
        let (Some(created_at), Some(path)) = (sub.created_utc, sub.permalink) else {
            tracing::debug!(target: "relay", "listing entry without created_utc/permalink");
            continue;
        };
        out.push(Item {
            title: normalize_title(sub.title.as_deref().unwrap_or_default()),
            created_at,
            path,
            source_id: sub.subreddit.unwrap_or_default(),
        });
    }
    Ok(out)
}

/// Reads the public "new" listing of one or more subreddits combined with `+`.
#[derive(Clone)]
pub struct RedditSource {
    base_url: String,
    user_agent: String,
    client: Client,
    timeout: Duration,
}

impl RedditSource {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn listing_url(&self, source_ids: &[String], limit: usize) -> String {
        format!(
            "{}/r/{}/new.json?limit={}",
            self.base_url,
            source_ids.join("+"),
            limit
        )
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Item>> {
        let t0 = std::time::Instant::now();
        let body = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .context("reddit get()")?
            .error_for_status()
            .context("reddit non-2xx")?
            .text()
            .await
            .context("reddit .text()")?;
        let items = parse_listing(&body)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("relay_fetch_ms").record(ms);
        Ok(items)
    }
}

#[async_trait]
impl ContentSource for RedditSource {
    async fn fetch_recent(
        &self,
        source_ids: &[String],
        limit: usize,
    ) -> crate::error::Result<Vec<Item>> {
        let url = self.listing_url(source_ids, limit);
        tracing::info!(target: "relay", source = self.name(), %url, "fetching listing");

        match self.fetch(&url).await {
            Ok(mut items) => {
                // Upstream should honour `limit`, but the cap is ours to keep.
                items.truncate(limit);
                for it in &items {
                    tracing::debug!(
                        target: "relay",
                        title = %it.title,
                        sub = %it.source_id,
                        "fetched"
                    );
                }
                Ok(items)
            }
            Err(e) => {
                counter!("relay_source_errors_total").increment(1);
                Err(RelayError::SourceUnavailable(format!("{e:#}")))
            }
        }
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}
