//! Runs a single poll cycle with the configured collaborators, then exits.
//! Handy from cron or for checking a new `.env` (`RELAY_SINK=log` for a dry run).

use reddit_relay::config::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    reddit_relay::init_tracing();

    let cfg = RelayConfig::from_env()?;
    let engine = reddit_relay::build_engine(&cfg);

    let report = engine.run_cycle().await?;
    println!(
        "relay-once done: subscriptions={} fetched={} kept={} delivered={} failed={} truncated={}",
        report.subscriptions,
        report.fetched,
        report.kept,
        report.delivered,
        report.failed,
        report.truncated
    );
    Ok(())
}
