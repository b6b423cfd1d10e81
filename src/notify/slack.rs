use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{backoff, is_retryable_status, RelaySink};
use crate::error::RelayError;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Clone)]
enum Target {
    Api {
        base: String,
        token: String,
        channel: String,
    },
    Webhook {
        url: String,
    },
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Outcome of one HTTP attempt; only transport errors, 5xx and 429 are retried.
enum Attempt {
    Done,
    Retry(anyhow::Error),
    Fatal(anyhow::Error),
}

#[derive(Clone)]
pub struct SlackNotifier {
    target: Target,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl SlackNotifier {
    /// Web API `chat.postMessage` with a bot token.
    pub fn api(token: String, channel: String) -> Self {
        Self::with_target(Target::Api {
            base: SLACK_API_BASE.to_string(),
            token,
            channel,
        })
    }

    /// Incoming webhook.
    pub fn webhook(url: String) -> Self {
        Self::with_target(Target::Webhook { url })
    }

    fn with_target(target: Target) -> Self {
        Self {
            target,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    /// Point the Web API mode somewhere else (tests, proxies).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        if let Target::Api { base: b, .. } = &mut self.target {
            *b = base.into().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn attempt(&self, message: &str) -> Attempt {
        let req = match &self.target {
            Target::Api {
                base,
                token,
                channel,
            } => self
                .client
                .post(format!("{base}/chat.postMessage"))
                .bearer_auth(token)
                .json(&serde_json::json!({ "channel": channel, "text": message })),
            Target::Webhook { url } => self
                .client
                .post(url)
                .json(&serde_json::json!({ "text": message })),
        };

        let rsp = match req.timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(anyhow!(e).context("slack post")),
        };
        let status = rsp.status();
        if !status.is_success() {
            let e = anyhow!("slack returned HTTP {status}");
            return if is_retryable_status(status) {
                Attempt::Retry(e)
            } else {
                Attempt::Fatal(e)
            };
        }

        // Past a 2xx Slack has taken the message, so nothing below may resend it.
        // Webhooks answer with a bare "ok"; the Web API answers 200 + {"ok": false} on errors.
        if let Target::Api { .. } = self.target {
            let parsed: Result<PostMessageResponse> =
                rsp.json().await.context("slack response json");
            match parsed {
                Ok(PostMessageResponse { ok: true, .. }) => {}
                Ok(PostMessageResponse { error, .. }) => {
                    return Attempt::Fatal(anyhow!(
                        "slack api error: {}",
                        error.unwrap_or_else(|| "unknown".to_string())
                    ))
                }
                Err(e) => {
                    let err = format!("{e:#}");
                    tracing::warn!(
                        target: "relay",
                        sink = "slack",
                        error = %err,
                        "unreadable 2xx response; assuming delivered"
                    );
                }
            }
        }
        Attempt::Done
    }
}

#[async_trait::async_trait]
impl RelaySink for SlackNotifier {
    async fn deliver(&self, message: &str) -> crate::error::Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.attempt(message).await {
                Attempt::Done => return Ok(()),
                Attempt::Fatal(e) => return Err(RelayError::SinkUnavailable(format!("{e:#}"))),
                Attempt::Retry(e) => {
                    let err = format!("{e:#}");
                    if attempt < self.max_retries {
                        tracing::warn!(
                            target: "relay",
                            sink = "slack",
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
        }
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
