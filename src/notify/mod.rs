pub mod discord;
pub mod slack;

use std::time::Duration;

use crate::config::SinkConfig;
use crate::error::Result;

/// Downstream collaborator that posts one plain-text message.
///
/// Implementations map every failure to `RelayError::SinkUnavailable`.
#[async_trait::async_trait]
pub trait RelaySink: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Dry-run sink: logs instead of posting.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl RelaySink for LogSink {
    async fn deliver(&self, message: &str) -> Result<()> {
        tracing::info!(target: "relay", sink = "log", %message, "dry-run delivery");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Build the configured sink.
pub fn build_sink(cfg: &SinkConfig, max_retries: u8, timeout_secs: u64) -> Box<dyn RelaySink> {
    match cfg {
        SinkConfig::SlackApi { token, channel } => Box::new(
            slack::SlackNotifier::api(token.clone(), channel.clone())
                .with_timeout(timeout_secs)
                .with_retries(max_retries),
        ),
        SinkConfig::SlackWebhook { url } => Box::new(
            slack::SlackNotifier::webhook(url.clone())
                .with_timeout(timeout_secs)
                .with_retries(max_retries),
        ),
        SinkConfig::Discord { webhook } => Box::new(
            discord::DiscordNotifier::new(webhook.clone())
                .with_timeout(timeout_secs)
                .with_retries(max_retries),
        ),
        SinkConfig::Log => Box::new(LogSink),
    }
}

/// Backoff before retry `attempt` (1-based): 500ms, 1s, 2s, ...
pub(crate) fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

/// Only server errors and rate limiting are worth another attempt; other
/// 4xx answers will fail the same way every time.
pub(crate) fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}
