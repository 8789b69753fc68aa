// tests/common/mod.rs
//
// In-process webhook stub: an axum server on 127.0.0.1:<random> that fails the
// first N requests with a configurable status/body, then answers 200.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Seen {
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Seen>>>,
    fail_first: usize,
    fail_status: StatusCode,
    fail_body: &'static str,
    ok_body: &'static str,
}

pub struct Stub {
    pub url: String,
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

fn header(h: &HeaderMap, name: &str) -> Option<String> {
    h.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn hook(State(s): State<StubState>, headers: HeaderMap, body: Bytes) -> (StatusCode, String) {
    let n = s.hits.fetch_add(1, Ordering::SeqCst);
    s.seen.lock().unwrap().push(Seen {
        authorization: header(&headers, "authorization"),
        accept: header(&headers, "accept"),
        content_type: header(&headers, "content-type"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });
    if n < s.fail_first {
        (s.fail_status, s.fail_body.to_string())
    } else {
        (StatusCode::OK, s.ok_body.to_string())
    }
}

pub async fn spawn_stub(
    fail_first: usize,
    fail_status: StatusCode,
    fail_body: &'static str,
    ok_body: &'static str,
) -> Stub {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        hits: hits.clone(),
        seen: seen.clone(),
        fail_first,
        fail_status,
        fail_body,
        ok_body,
    };
    let app = Router::new().route("/hook", post(hook)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    Stub {
        url: format!("http://{addr}/hook"),
        hits,
        seen,
    }
}

/// A localhost URL nothing listens on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind closed port");
    let addr = listener.local_addr().expect("closed port addr");
    drop(listener);
    format!("http://{addr}/hook")
}

pub fn fields(v: Value) -> serde_json::Map<String, Value> {
    v.as_object().cloned().expect("object")
}
