use super::{backoff, is_retryable_status, RelaySink};
use crate::error::{RelayError, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

// Discord rejects content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[async_trait::async_trait]
impl RelaySink for DiscordNotifier {
    async fn deliver(&self, message: &str) -> Result<()> {
        let payload = DiscordWebhookPayload::text(message);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    let err = format!("Discord webhook HTTP error: {status}");
                    if !is_retryable_status(status) {
                        return Err(RelayError::SinkUnavailable(err));
                    }
                    err
                }
                Err(e) => format!("Discord webhook request failed: {e}"),
            };

            if attempt < self.max_retries {
                tracing::warn!(
                    target: "relay",
                    sink = "discord",
                    attempt,
                    error = %err,
                    "retrying delivery"
                );
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
            return Err(RelayError::SinkUnavailable(err));
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: String,
}

impl DiscordWebhookPayload {
    fn text(message: &str) -> Self {
        Self {
            content: message.chars().take(MAX_CONTENT_CHARS).collect(),
        }
    }
}
