//! ImmiWatch webhook service: binary entrypoint.
//! Boots the Axum HTTP server that receives automation triggers, publishes
//! article pages and forwards records.

use immiwatch_pipeline::{api, metrics::Metrics, Pipeline, PipelineConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    immiwatch_pipeline::init_tracing();

    let cfg = PipelineConfig::load_default()?;
    let publisher = cfg.build_publisher().await?;
    let pipeline = Pipeline::from_config(&cfg).with_publisher(publisher);

    if cfg.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set; /webhook/news will reject every request");
    }
    tracing::info!(
        site_root = %cfg.site_root.display(),
        dispatch = cfg.build_dispatch().is_some(),
        slack = cfg.slack_webhook_url.is_some(),
        "webhook handler configured"
    );

    let state = api::AppState::new(pipeline, cfg.webhook_secret.clone());
    let mut router = api::create_router(state);
    match Metrics::init(cfg.delivery.max_retries) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
