//! reddit-relay binary entrypoint.
//! Loads configuration, wires the poll engine, runs the scheduler until
//! SIGINT/SIGTERM, then gives the in-flight cycle a grace period to finish.

use std::sync::Arc;

use reddit_relay::config::RelayConfig;
use reddit_relay::ingest::scheduler::{spawn_scheduler, SchedulerCfg};
use reddit_relay::metrics::Metrics;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    reddit_relay::init_tracing();

    // Configuration problems are the only fatal errors.
    let cfg = RelayConfig::from_env()?;

    if let Some(addr) = cfg.metrics_addr {
        let metrics = Metrics::init()?;
        tokio::spawn(async move {
            if let Err(e) = reddit_relay::metrics::serve(metrics, addr).await {
                tracing::error!(target: "relay", error = ?e, "metrics endpoint stopped");
            }
        });
    }

    let engine = Arc::new(reddit_relay::build_engine(&cfg));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler = spawn_scheduler(engine, SchedulerCfg::from(&cfg), shutdown_rx);

    tokio::select! {
        () = shutdown_signal() => {}
        res = &mut scheduler => {
            // The loop only ends on shutdown, so this is a panic.
            anyhow::bail!("scheduler exited unexpectedly: {res:?}");
        }
    }

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(cfg.shutdown_grace, &mut scheduler).await {
        Ok(Ok(cycles)) => tracing::info!(target: "relay", cycles, "shut down cleanly"),
        Ok(Err(e)) => tracing::error!(target: "relay", error = %e, "scheduler task failed"),
        Err(_) => {
            tracing::warn!(
                target: "relay",
                grace_secs = cfg.shutdown_grace.as_secs(),
                "in-flight cycle did not finish within grace period; exiting anyway"
            );
            scheduler.abort();
        }
    }
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        tracing::info!(target: "relay", "received ctrl-c, shutting down");
                    }
                    _ = sigterm.recv() => {
                        tracing::info!(target: "relay", "received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "relay",
                    error = %e,
                    "SIGTERM handler unavailable; ctrl-c only"
                );
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!(target: "relay", "received ctrl-c, shutting down");
    }
}
