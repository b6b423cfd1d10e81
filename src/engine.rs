//! # Poll Engine
//! Runs exactly one poll cycle: subscriptions → watermark → fetch → filter →
//! advance watermark → dispatch.
//!
//! Delivery is at-most-once. The new watermark (wall-clock time of the poll,
//! floored at the old watermark and the newest fetched item) is persisted
//! before any message is sent, so a crash or a failed delivery loses items
//! instead of reposting them.

use metrics::{counter, gauge};

use crate::error::Result;
use crate::ingest::subscriptions::SubscriptionList;
use crate::ingest::types::ContentSource;
use crate::ingest::{filter_new, is_truncated};
use crate::message::{format_item, DEFAULT_LINK_BASE};
use crate::metrics::ensure_metrics_described;
use crate::notify::RelaySink;
use crate::watermark::{Watermark, WatermarkStore};

/// Wall-clock source, injectable for tests.
pub trait Clock: Send + Sync {
    /// Seconds since the unix epoch.
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Cap on a single fetch.
    pub max_items: usize,
    /// Prefix for item links in messages.
    pub link_base: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_items: crate::config::DEFAULT_MAX_ITEMS,
            link_base: DEFAULT_LINK_BASE.to_string(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub subscriptions: usize,
    pub watermark_before: Option<Watermark>,
    pub watermark_after: Option<Watermark>,
    pub fetched: usize,
    pub kept: usize,
    pub delivered: usize,
    pub failed: usize,
    pub truncated: bool,
}

impl CycleReport {
    /// True when the cycle had no subscriptions and touched nothing.
    pub fn is_idle(&self) -> bool {
        self.subscriptions == 0
    }
}

pub struct PollEngine {
    source: Box<dyn ContentSource>,
    sink: Box<dyn RelaySink>,
    watermark: Box<dyn WatermarkStore>,
    subscriptions: Box<dyn SubscriptionList>,
    clock: Box<dyn Clock>,
    settings: EngineSettings,
}

impl PollEngine {
    pub fn new(
        source: Box<dyn ContentSource>,
        sink: Box<dyn RelaySink>,
        watermark: Box<dyn WatermarkStore>,
        subscriptions: Box<dyn SubscriptionList>,
        clock: Box<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            source,
            sink,
            watermark,
            subscriptions,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Execute one cycle. Source and store failures abort it; per-item
    /// delivery failures are logged and counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        ensure_metrics_described();
        counter!("relay_cycles_total").increment(1);

        let result = self.cycle().await;
        if let Err(e) = &result {
            counter!("relay_cycle_failures_total", "kind" => e.kind()).increment(1);
        }
        result
    }

    async fn cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        // 1) Subscriptions, re-read every cycle
        let subs = self.subscriptions.read()?;
        report.subscriptions = subs.len();
        if subs.is_empty() {
            tracing::info!(target: "relay", outcome = "idle", "no subscriptions; skipping cycle");
            return Ok(report);
        }

        // 2) Watermark snapshot
        let w = self.watermark.read()?;
        report.watermark_before = Some(w);

        // 3) Fetch; a source failure leaves the watermark untouched
        let limit = self.settings.max_items;
        let fetched = self.source.fetch_recent(&subs, limit).await?;
        report.fetched = fetched.len();
        counter!("relay_items_fetched_total").increment(fetched.len() as u64);

        if is_truncated(fetched.len(), limit) {
            report.truncated = true;
            counter!("relay_truncated_fetches_total").increment(1);
            tracing::warn!(
                target: "relay",
                source = self.source.name(),
                fetched = fetched.len(),
                limit,
                "fetch hit the per-poll cap; older new items may be skipped"
            );
        }

        let newest = fetched
            .iter()
            .map(|it| it.created_at)
            .fold(f64::NEG_INFINITY, f64::max);

        // 4) Strictly newer than the watermark
        let (kept, skipped) = filter_new(fetched, w);
        report.kept = kept.len();

        // 5) Advance before dispatch. Poll time normally; never behind the
        // previous watermark or anything fetched, even if the local clock lags.
        let now = self.clock.now();
        if now < newest {
            tracing::warn!(
                target: "relay",
                now,
                newest,
                "local clock is behind the newest fetched item; using item time as watermark"
            );
        }
        let next = Watermark::new(now.max(w.as_f64()).max(newest));
        self.watermark.write(next)?;
        report.watermark_after = Some(next);
        gauge!("relay_watermark_ts").set(next.as_f64());

        if kept.is_empty() {
            tracing::info!(
                target: "relay",
                source = self.source.name(),
                fetched = report.fetched,
                skipped,
                watermark = %next,
                outcome = "no_new_items",
                "no recent submissions"
            );
            return Ok(report);
        }

        // 6) Dispatch oldest first; one failure never stops the rest
        for item in kept.iter().rev() {
            let message = format_item(item, &self.settings.link_base);
            match self.sink.deliver(&message).await {
                Ok(()) => {
                    report.delivered += 1;
                    counter!("relay_items_delivered_total").increment(1);
                    tracing::info!(
                        target: "relay",
                        sink = self.sink.name(),
                        sub = %item.source_id,
                        path = %item.path,
                        outcome = "delivered",
                        "relayed item"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("relay_delivery_failures_total").increment(1);
                    tracing::error!(
                        target: "relay",
                        sink = self.sink.name(),
                        sub = %item.source_id,
                        path = %item.path,
                        created_at = item.created_at,
                        error = %e,
                        outcome = "lost",
                        "delivery failed; item will not be retried"
                    );
                }
            }
        }

        tracing::info!(
            target: "relay",
            source = self.source.name(),
            fetched = report.fetched,
            kept = report.kept,
            delivered = report.delivered,
            failed = report.failed,
            watermark = %next,
            outcome = "completed",
            "poll cycle finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for PollEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollEngine")
            .field("source", &self.source.name())
            .field("sink", &self.sink.name())
            .field("settings", &self.settings)
            .finish()
    }
}

