use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_cycles_total", "Poll cycles started.");
        describe_counter!(
            "relay_cycle_failures_total",
            "Poll cycles aborted by a source or store failure."
        );
        describe_counter!("relay_items_fetched_total", "Items returned by the content source.");
        describe_counter!(
            "relay_items_delivered_total",
            "Items delivered to the sink."
        );
        describe_counter!(
            "relay_delivery_failures_total",
            "Items lost because delivery failed after the watermark advanced."
        );
        describe_counter!(
            "relay_truncated_fetches_total",
            "Fetches that filled the per-poll cap (items may have been skipped)."
        );
        describe_counter!("relay_source_errors_total", "Content source request failures.");
        describe_histogram!("relay_fetch_ms", "Content source fetch time in milliseconds.");
        describe_gauge!("relay_watermark_ts", "Watermark written by the last cycle.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if another recorder is installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` (Prometheus exposition) and `/health`.
    pub fn router(&self) -> Router {
        router_for(self.handle.clone())
    }
}

pub fn router_for(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
}

/// Serve the metrics router until the process exits.
pub async fn serve(metrics: Metrics, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "relay", %addr, "metrics endpoint listening");
    axum::serve(listener, metrics.router()).await?;
    Ok(())
}
