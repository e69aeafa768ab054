use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if a recorder is already set.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("backend_errors_total", "Backend calls that failed or returned non-200");
        describe_counter!("backend_empty_total", "Backend 200 replies without content");
        describe_counter!("backend_replies_total", "Backend replies forwarded to fan-out");
        describe_histogram!("backend_call_ms", "Backend round-trip time in milliseconds");
        describe_counter!("bulk_runs_total", "Bulk analysis requests sent");
        describe_counter!("bulk_corpus_errors_total", "Rolling corpus read/clear failures");
        describe_counter!("notify_errors_total", "Webhook notifications that failed");
        describe_counter!("fanout_replies_total", "Replies handed to the sink");
        describe_counter!("cycle_runs_total", "Fetch cycles started");
        describe_counter!("cycle_skipped_total", "Fetch triggers skipped because a cycle was running");
        describe_histogram!("cycle_ms", "Fetch cycle duration in milliseconds");

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
