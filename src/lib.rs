// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod message;
pub mod metrics;
pub mod notify;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::engine::{CycleReport, PollEngine};
pub use crate::error::RelayError;
pub use crate::ingest::types::{ContentSource, Item};
pub use crate::notify::RelaySink;

use crate::config::RelayConfig;
use crate::engine::{EngineSettings, SystemClock};
use crate::ingest::providers::reddit::RedditSource;
use crate::ingest::subscriptions::FileSubscriptionList;
use crate::watermark::FileWatermarkStore;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `LOG_FORMAT=json` switches to JSON
/// lines; the filter comes from `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Wire the production collaborators described by `cfg` into an engine.
pub fn build_engine(cfg: &RelayConfig) -> PollEngine {
    let source = RedditSource::new(cfg.reddit_base_url.clone(), cfg.reddit_user_agent.clone())
        .with_timeout(cfg.http_timeout_secs);
    let sink = notify::build_sink(&cfg.sink, cfg.sink_max_retries, cfg.http_timeout_secs);

    tracing::info!(
        target: "relay",
        source = "reddit",
        sink = sink.name(),
        max_items = cfg.max_items,
        watermark = %cfg.watermark_path.display(),
        subscriptions = %cfg.subscriptions_path.display(),
        "engine configured"
    );

    PollEngine::new(
        Box::new(source),
        sink,
        Box::new(FileWatermarkStore::new(cfg.watermark_path.clone())),
        Box::new(FileSubscriptionList::new(cfg.subscriptions_path.clone())),
        Box::new(SystemClock),
        EngineSettings {
            max_items: cfg.max_items,
            link_base: cfg.link_base.clone(),
        },
    )
}
