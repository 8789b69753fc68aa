// tests/api_http.rs
//
// HTTP-level tests for the webhook Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use immiwatch_pipeline::api::{self, AppState};
use immiwatch_pipeline::publish::Publisher;
use immiwatch_pipeline::{FieldMapper, Pipeline, Validator};

const BODY_LIMIT: usize = 1024 * 1024;
const SECRET: &str = "test-secret";

fn test_router(site_root: &std::path::Path) -> Router {
    let pipeline = Pipeline::new(FieldMapper::airtable_news(), Validator::default())
        .with_publisher(Publisher::new(site_root));
    api::create_router(AppState::new(pipeline, Some(SECRET.to_string())))
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn news_request(uri: &str, secret: Option<&str>, body: String) -> Request<Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(s) = secret {
        b = b.header("X-Webhook-Secret", s);
    }
    b.body(Body::from(body)).expect("build request")
}

fn valid_trigger() -> Json {
    json!({ "record": { "fields": {
        "Headline": "New PGWP Rules Announced",
        "Summary": "Post-graduation work permit eligibility changes.",
        "Category": "Policy-Announcements",
        "Impact": "High",
        "Date of Update": "2025-07-29"
    }}})
}

#[tokio::test]
async fn health_and_home() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let resp = app
        .clone()
        .oneshot(Request::get("/webhook/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["status"], "healthy");

    let resp = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert!(v["endpoints"].get("/webhook/news").is_some());
}

#[tokio::test]
async fn rejects_missing_or_wrong_secret() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let resp = app
        .clone()
        .oneshot(news_request("/webhook/news", None, valid_trigger().to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(resp).await["error"], "No webhook secret provided");

    let resp = app
        .oneshot(news_request("/webhook/news", Some("wrong"), valid_trigger().to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(resp).await["error"], "Invalid webhook secret");
}

#[tokio::test]
async fn rejects_non_json_body() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(news_request("/webhook/news", Some(SECRET), "not json".into()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(resp).await["error"], "No JSON data provided");
}

#[tokio::test]
async fn publishes_valid_record() {
    let dir = tempfile::tempdir().unwrap();
    let resp = test_router(dir.path())
        .oneshot(news_request(
            "/webhook/news",
            Some(SECRET),
            valid_trigger().to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["success"], true);
    assert_eq!(
        v["article_url"],
        "https://immiwatch.ca/news/daily/policy-announcements/2025-07-29/new-pgwp-rules-announced/"
    );

    let page = dir
        .path()
        .join("news/daily/policy-announcements/2025-07-29/new-pgwp-rules-announced/index.html");
    let html = std::fs::read_to_string(page).expect("article written");
    assert!(html.contains("<title>New PGWP Rules Announced | ImmiWatch Immigration News</title>"));
}

#[tokio::test]
async fn secret_in_query_and_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let trigger = json!({ "fields": { "Summary": "no headline", "Category": "draws", "Impact": "low", "Date of Update": "2025-07-29" } });
    let resp = test_router(dir.path())
        .oneshot(news_request(
            &format!("/webhook/news?secret={SECRET}"),
            None,
            trigger.to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert_eq!(v["success"], false);
    let errors: Vec<String> = serde_json::from_value(v["errors"].clone()).unwrap();
    assert_eq!(
        errors,
        vec![
            "Missing required field: headline".to_string(),
            "Missing required field for draw: cutoff".to_string(),
            "Missing required field for draw: invitation".to_string(),
        ]
    );
    // draft report for the editors
    assert!(dir
        .path()
        .join("news/daily/drafts/2025-07-29/unknown/ERROR_REPORT.md")
        .exists());
}

#[tokio::test]
async fn authenticated_payload_without_record_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());
    for body in [
        json!({}),
        json!({ "records": [] }),
        json!({ "records": [{ "id": "x" }] }),
    ] {
        let resp = app
            .clone()
            .oneshot(news_request("/webhook/news", Some(SECRET), body.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(
            read_json(resp).await["error"],
            "No usable record in trigger payload"
        );
    }
}
