// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::PollEngine;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    /// Run the first cycle immediately instead of after one interval.
    pub run_on_start: bool,
}

impl From<&crate::config::RelayConfig> for SchedulerCfg {
    fn from(cfg: &crate::config::RelayConfig) -> Self {
        Self {
            interval: cfg.poll_interval,
            run_on_start: cfg.run_on_start,
        }
    }
}

/// Run cycles at a fixed rate until `shutdown` flips to `true` (or its sender
/// is dropped). Ticks are measured from cycle starts, so a slow cycle shortens
/// the following wait; an overrunning cycle is followed immediately by the
/// next one. A cycle in flight always runs to completion. Returns the number
/// of cycles started.
pub async fn run_scheduler(
    engine: Arc<PollEngine>,
    cfg: SchedulerCfg,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let start = if cfg.run_on_start {
        Instant::now()
    } else {
        Instant::now() + cfg.interval
    };
    let mut ticker = tokio::time::interval_at(start, cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles: u64 = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        cycles += 1;
        let eng = Arc::clone(&engine);
        // Own task so a panic inside a collaborator is contained; awaited
        // immediately, so cycles never overlap.
        match tokio::spawn(async move { eng.run_cycle().await }).await {
            Ok(Ok(report)) => {
                tracing::debug!(target: "relay", cycle = cycles, ?report, "cycle done");
            }
            Ok(Err(e)) => {
                tracing::error!(
                    target: "relay",
                    cycle = cycles,
                    kind = e.kind(),
                    error = %e,
                    outcome = "cycle_failed",
                    "poll cycle failed; will retry on next tick"
                );
            }
            Err(join_err) => {
                tracing::error!(
                    target: "relay",
                    cycle = cycles,
                    error = %join_err,
                    outcome = "cycle_panicked",
                    "poll cycle panicked; will retry on next tick"
                );
            }
        }
    }

    tracing::info!(target: "relay", cycles, "scheduler stopped");
    cycles
}

/// Spawn the scheduler on the runtime. Wire this from your app startup.
pub fn spawn_scheduler(
    engine: Arc<PollEngine>,
    cfg: SchedulerCfg,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<u64> {
    tracing::info!(
        target: "relay",
        interval_secs = cfg.interval.as_secs(),
        run_on_start = cfg.run_on_start,
        "scheduler starting"
    );
    tokio::spawn(run_scheduler(engine, cfg, shutdown))
}
