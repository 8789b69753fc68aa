// tests/delivery_retry.rs
//
// Retry policy of the delivery client against a local stub endpoint.

mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde_json::json;

use immiwatch_pipeline::delivery::DispatchClient;
use immiwatch_pipeline::{DeliveryClient, DeliveryError, Record, ResponseBody};

const BASE: Duration = Duration::from_millis(100);

#[tokio::test]
async fn fails_twice_then_succeeds_with_linear_backoff() {
    let stub = common::spawn_stub(2, StatusCode::SERVICE_UNAVAILABLE, "busy", r#"{"ok":true}"#).await;
    let client = DeliveryClient::new().with_base_delay(BASE);

    let started = Instant::now();
    let res = client
        .send(&stub.url, &json!({ "headline": "X" }), 3)
        .await
        .expect("third attempt succeeds");
    let elapsed = started.elapsed();

    assert_eq!(res.status, 200);
    assert_eq!(res.attempts, 3);
    assert_eq!(res.body, ResponseBody::Json(json!({ "ok": true })));
    assert_eq!(stub.hits(), 3);
    // base*1 + base*2
    assert!(elapsed >= BASE * 3, "elapsed {elapsed:?}");
    assert!(elapsed < BASE * 3 + Duration::from_secs(2), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn always_failing_endpoint_gets_exactly_max_attempts() {
    let stub = common::spawn_stub(usize::MAX, StatusCode::INTERNAL_SERVER_ERROR, "boom", "").await;
    let client = DeliveryClient::new().with_base_delay(Duration::from_millis(10));

    let err = client
        .send(&stub.url, &json!({}), 3)
        .await
        .expect_err("never succeeds");

    assert_eq!(stub.hits(), 3);
    assert_eq!(err.attempts(), 3);
    match err {
        DeliveryError::Http { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, ResponseBody::Text("boom".into()));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_retries_still_makes_one_attempt() {
    let stub = common::spawn_stub(usize::MAX, StatusCode::BAD_GATEWAY, "", "").await;
    let err = DeliveryClient::new()
        .send(&stub.url, &json!({}), 0)
        .await
        .unwrap_err();
    assert_eq!(stub.hits(), 1);
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn connection_refused_is_network_error() {
    let url = common::closed_url().await;
    let err = DeliveryClient::new()
        .with_base_delay(Duration::from_millis(10))
        .send(&url, &json!({}), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Network { attempts: 2, .. }), "{err:?}");
}

#[tokio::test]
async fn dispatch_sends_event_envelope_and_token() {
    let stub = common::spawn_stub(0, StatusCode::OK, "", "").await;
    let delivery = DeliveryClient::new().with_token("s3cret");
    let client = DispatchClient::new(stub.url.clone(), delivery).with_event_type("express_entry_draw");

    let mut rec = Record::new();
    rec.insert("headline", "X");
    rec.insert("cutoff", 485);
    let res = client.dispatch(&rec).await.expect("dispatch ok");
    assert_eq!(res.body, ResponseBody::Empty);

    let seen = stub.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("token s3cret"));
    assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(
        seen[0].body,
        json!({ "event_type": "express_entry_draw", "client_payload": { "headline": "X", "cutoff": 485 } })
    );
}
