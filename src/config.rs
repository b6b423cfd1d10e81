// src/config.rs
//! Runtime configuration read from the environment (a `.env` file is loaded
//! by the binaries first). Every value has a default except sink credentials.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::ingest::providers::reddit::DEFAULT_BASE_URL;
use crate::message::DEFAULT_LINK_BASE;

pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL_SECONDS";
pub const ENV_MAX_ITEMS: &str = "MAX_ITEMS_PER_POLL";
pub const ENV_RUN_ON_START: &str = "POLL_RUN_ON_START";
pub const ENV_WATERMARK_PATH: &str = "WATERMARK_PATH";
pub const ENV_SUBSCRIPTIONS_PATH: &str = "SUBSCRIPTIONS_PATH";
pub const ENV_SINK: &str = "RELAY_SINK";
pub const ENV_SLACK_CHANNEL: &str = "SLACK_CHANNEL";
pub const ENV_SLACK_TOKEN: &str = "SLACK_TOKEN";
pub const ENV_SLACK_WEBHOOK: &str = "SLACK_WEBHOOK_URL";
pub const ENV_DISCORD_WEBHOOK: &str = "DISCORD_WEBHOOK_URL";
pub const ENV_SINK_RETRIES: &str = "SINK_MAX_RETRIES";
pub const ENV_REDDIT_BASE_URL: &str = "REDDIT_BASE_URL";
pub const ENV_REDDIT_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT_SECONDS";
pub const ENV_LINK_BASE: &str = "LINK_BASE";
pub const ENV_SHUTDOWN_GRACE: &str = "SHUTDOWN_GRACE_SECONDS";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_ITEMS: usize = 10;
pub const DEFAULT_WATERMARK_PATH: &str = "conf/last_poll_time";
pub const DEFAULT_SUBSCRIPTIONS_PATH: &str = "conf/subscribed_subreddits";
pub const DEFAULT_SLACK_CHANNEL: &str = "#news";

/// Where relayed messages go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    /// Slack Web API `chat.postMessage`.
    SlackApi { token: String, channel: String },
    /// Slack incoming webhook (channel is fixed by the webhook).
    SlackWebhook { url: String },
    Discord { webhook: String },
    /// Dry run: log messages instead of posting them.
    Log,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    pub max_items: usize,
    pub run_on_start: bool,
    pub watermark_path: PathBuf,
    pub subscriptions_path: PathBuf,
    pub sink: SinkConfig,
    pub sink_max_retries: u8,
    pub reddit_base_url: String,
    pub reddit_user_agent: String,
    pub http_timeout_secs: u64,
    pub link_base: String,
    pub shutdown_grace: Duration,
    pub metrics_addr: Option<SocketAddr>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let poll_secs: u64 = parse_or(&get, ENV_POLL_INTERVAL, DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(invalid(ENV_POLL_INTERVAL, "must be greater than zero"));
        }
        let max_items: usize = parse_or(&get, ENV_MAX_ITEMS, DEFAULT_MAX_ITEMS)?;
        if max_items == 0 {
            return Err(invalid(ENV_MAX_ITEMS, "must be greater than zero"));
        }

        let sink = match get(ENV_SINK)
            .unwrap_or_else(|| "slack".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "slack" => {
                if let Some(url) = get(ENV_SLACK_WEBHOOK) {
                    SinkConfig::SlackWebhook { url }
                } else if let Some(token) = get(ENV_SLACK_TOKEN) {
                    SinkConfig::SlackApi {
                        token,
                        channel: get(ENV_SLACK_CHANNEL)
                            .unwrap_or_else(|| DEFAULT_SLACK_CHANNEL.to_string()),
                    }
                } else {
                    return Err(RelayError::ConfigInvalid(format!(
                        "slack sink needs {ENV_SLACK_TOKEN} or {ENV_SLACK_WEBHOOK}"
                    )));
                }
            }
            "discord" => SinkConfig::Discord {
                webhook: get(ENV_DISCORD_WEBHOOK)
                    .ok_or_else(|| invalid(ENV_DISCORD_WEBHOOK, "required for discord sink"))?,
            },
            "log" | "dry-run" => SinkConfig::Log,
            other => return Err(invalid(ENV_SINK, &format!("unknown sink kind {other:?}"))),
        };

        let metrics_addr = match get(ENV_METRICS_ADDR) {
            Some(s) => Some(
                s.parse::<SocketAddr>()
                    .map_err(|e| invalid(ENV_METRICS_ADDR, &e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            poll_interval: Duration::from_secs(poll_secs),
            max_items,
            run_on_start: parse_flag(get(ENV_RUN_ON_START)),
            watermark_path: get(ENV_WATERMARK_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WATERMARK_PATH)),
            subscriptions_path: get(ENV_SUBSCRIPTIONS_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUBSCRIPTIONS_PATH)),
            sink,
            sink_max_retries: parse_or(&get, ENV_SINK_RETRIES, 3u8)?.max(1),
            reddit_base_url: get(ENV_REDDIT_BASE_URL)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            reddit_user_agent: get(ENV_REDDIT_USER_AGENT)
                .unwrap_or_else(|| format!("reddit-relay/{}", env!("CARGO_PKG_VERSION"))),
            http_timeout_secs: parse_or(&get, ENV_HTTP_TIMEOUT, 10u64)?,
            link_base: get(ENV_LINK_BASE).unwrap_or_else(|| DEFAULT_LINK_BASE.to_string()),
            shutdown_grace: Duration::from_secs(parse_or(&get, ENV_SHUTDOWN_GRACE, 30u64)?),
            metrics_addr,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| invalid(key, &format!("{raw:?}: {e}"))),
        None => Ok(default),
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(
        raw.unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn invalid(key: &str, why: &str) -> RelayError {
    RelayError::ConfigInvalid(format!("{key}: {why}"))
}
