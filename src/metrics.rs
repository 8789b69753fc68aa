// src/metrics.rs
//! Prometheus exposition for the pipeline counters.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time series registration, so descriptions show up on /metrics.
pub fn describe() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_records_total", "Records received by the pipeline.");
        describe_counter!("pipeline_invalid_total", "Records rejected by validation.");
        describe_counter!("pipeline_published_total", "Article pages written.");
        describe_counter!("pipeline_dispatched_total", "Records delivered to the dispatch endpoint.");
        describe_counter!("delivery_attempts_total", "Outbound webhook attempts, retries included.");
        describe_counter!("delivery_failures_total", "Deliveries that failed after all retries.");
        describe_counter!("notify_failures_total", "Chat notifications that could not be sent.");
        describe_gauge!("delivery_max_retries", "Configured attempts per outbound delivery.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder and publish the configured retry budget.
    /// Fails if a recorder is already installed.
    pub fn init(max_retries: u32) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        gauge!("delivery_max_retries").set(f64::from(max_retries));
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus text format.
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
