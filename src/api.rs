// src/api.rs
//! Webhook receiver for automation triggers.
//!
//! - `POST /webhook/news`   run the pipeline on a trigger payload
//! - `GET  /webhook/health` liveness
//! - `GET  /`               usage

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::envelope::extract_first;
use crate::pipeline::Pipeline;

pub const SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, webhook_secret: Option<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            webhook_secret,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/webhook/health", get(health))
        .route("/webhook/news", post(handle_news))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiResponse = (StatusCode, Json<Value>);

fn check_secret(
    expected: Option<&str>,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<(), &'static str> {
    let Some(expected) = expected else {
        return Err("Webhook secret not configured");
    };
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| query.get("secret").map(String::as_str));
    match provided {
        None => Err("No webhook secret provided"),
        Some(p) if secrets_match(p.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => Err("Invalid webhook secret"),
    }
}

/// Byte comparison without an early exit on the first mismatch.
fn secrets_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn handle_news(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse {
    if let Err(msg) = check_secret(state.webhook_secret.as_deref(), &headers, &query) {
        tracing::warn!(reason = msg, "webhook rejected");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg })));
    }

    let data: Value = match serde_json::from_slice(&body) {
        Ok(v @ Value::Object(_)) => v,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "No JSON data provided" })),
            )
        }
    };

    if extract_first(&data).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No usable record in trigger payload" })),
        );
    }

    tracing::info!(bytes = body.len(), "webhook payload received");
    let outcome = state.pipeline.process(&data).await;

    if outcome.success {
        let body = json!({
            "success": true,
            "message": "Article published successfully",
            "article_url": outcome.article_url.as_deref().unwrap_or("N/A"),
            "warnings": outcome.warnings,
        });
        return (StatusCode::OK, Json(body));
    }

    if !outcome.errors.is_empty() {
        let body = json!({
            "success": false,
            "message": "Validation failed",
            "errors": outcome.errors,
            "warnings": outcome.warnings,
        });
        return (StatusCode::BAD_REQUEST, Json(body));
    }

    let body = json!({
        "success": false,
        "message": "Article publication failed",
        "error": outcome.error.as_deref().unwrap_or("Check logs for details"),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "ImmiWatch News Webhook",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn home() -> Json<Value> {
    Json(json!({
        "service": "ImmiWatch News Webhook Handler",
        "endpoints": {
            "/webhook/news": "POST - Receive news data from Airtable",
            "/webhook/health": "GET - Health check",
            "/": "GET - This information"
        },
        "usage": {
            "method": "POST",
            "url": "/webhook/news",
            "headers": {
                "Content-Type": "application/json",
                "X-Webhook-Secret": "your-secret-key"
            },
            "body": "JSON data from Airtable"
        }
    }))
}
