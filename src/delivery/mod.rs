// src/delivery/mod.rs
//! Outbound webhook delivery: JSON POST with fixed headers, a 30 s timeout and
//! linear-backoff retries.

pub mod dispatch;

use std::collections::BTreeMap;
use std::time::Duration;

use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use dispatch::{DispatchClient, DispatchPayload};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

const USER_AGENT: &str = concat!("immiwatch-pipeline/", env!("CARGO_PKG_VERSION"));

/// Response body as received. Bodies that are not JSON degrade to raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Empty,
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return ResponseBody::Empty;
        }
        match serde_json::from_slice(bytes) {
            Ok(v) => ResponseBody::Json(v),
            Err(_) => ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivered {
    pub status: u16,
    pub body: ResponseBody,
    pub attempts: u32,
}

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Timeout, DNS or connection failure.
    #[error("network error after {attempts} attempt(s): {message}")]
    Network { message: String, attempts: u32 },
    /// Non-2xx response; the body is kept for the caller.
    #[error("HTTP {status} after {attempts} attempt(s)")]
    Http {
        status: u16,
        body: ResponseBody,
        attempts: u32,
    },
    /// The request could not be built (bad URL or header); not retried.
    #[error("invalid request: {0}")]
    Request(String),
}

impl DeliveryError {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryError::Network { attempts, .. } | DeliveryError::Http { attempts, .. } => {
                *attempts
            }
            DeliveryError::Request(_) => 1,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeliveryClient {
    client: Client,
    headers: BTreeMap<String, String>,
    timeout: Duration,
    base_delay: Duration,
    max_retries: u32,
}

impl Default for DeliveryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryClient {
    pub fn new() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert("user-agent".to_string(), USER_AGENT.to_string());
        Self {
            client: Client::new(),
            headers,
            timeout: DEFAULT_TIMEOUT,
            base_delay: DEFAULT_BASE_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set (or replace) a static header sent with every request.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// `Authorization: token <secret>`. A blank token removes the header.
    pub fn with_token(mut self, token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            self.headers.remove("authorization");
            return self;
        }
        self.with_header("authorization", format!("token {token}"))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// POST with the configured retry budget.
    pub async fn deliver<T>(&self, url: &str, payload: &T) -> Result<Delivered, DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        self.send(url, payload, self.max_retries).await
    }

    /// POST `payload` as JSON to `url`, making at most `max_retries` attempts
    /// (0 counts as 1). The delay before retry `i` is `base_delay * i`.
    pub async fn send<T>(
        &self,
        url: &str,
        payload: &T,
        max_retries: u32,
    ) -> Result<Delivered, DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        let max_attempts = max_retries.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            counter!("delivery_attempts_total").increment(1);

            let mut req = self.client.post(url).timeout(self.timeout).json(payload);
            for (name, value) in &self.headers {
                req = req.header(name.as_str(), value.as_str());
            }

            let failure = match req.send().await {
                Ok(rsp) => {
                    let status = rsp.status();
                    let body = match rsp.bytes().await {
                        Ok(b) => ResponseBody::from_bytes(&b),
                        Err(e) => {
                            tracing::debug!(error = %e, "response body unreadable");
                            ResponseBody::Empty
                        }
                    };
                    if status.is_success() {
                        tracing::debug!(url, attempt, status = status.as_u16(), "delivered");
                        return Ok(Delivered {
                            status: status.as_u16(),
                            body,
                            attempts: attempt,
                        });
                    }
                    DeliveryError::Http {
                        status: status.as_u16(),
                        body,
                        attempts: attempt,
                    }
                }
                Err(e) if e.is_builder() => {
                    counter!("delivery_failures_total").increment(1);
                    return Err(DeliveryError::Request(e.to_string()));
                }
                Err(e) => DeliveryError::Network {
                    message: e.to_string(),
                    attempts: attempt,
                },
            };

            if attempt >= max_attempts {
                counter!("delivery_failures_total").increment(1);
                tracing::warn!(url, attempts = attempt, error = %failure, "delivery failed");
                return Err(failure);
            }

            let delay = self.base_delay * attempt;
            tracing::warn!(
                url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "delivery attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_degrades_to_text() {
        assert_eq!(ResponseBody::from_bytes(b""), ResponseBody::Empty);
        assert_eq!(ResponseBody::from_bytes(b" \n"), ResponseBody::Empty);
        assert_eq!(
            ResponseBody::from_bytes(br#"{"ok":true}"#),
            ResponseBody::Json(json!({ "ok": true }))
        );
        assert_eq!(
            ResponseBody::from_bytes(b"Bad credentials"),
            ResponseBody::Text("Bad credentials".into())
        );
    }

    #[test]
    fn token_header_replaces_previous_value() {
        let c = DeliveryClient::new().with_token("a").with_token("b");
        assert_eq!(c.headers.get("authorization").map(String::as_str), Some("token b"));
        assert_eq!(c.headers.get("accept").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn blank_token_sends_no_authorization() {
        assert!(!DeliveryClient::new().with_token("  ").headers.contains_key("authorization"));
        let c = DeliveryClient::new().with_token("a").with_token("");
        assert!(!c.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn malformed_url_is_not_retried() {
        let c = DeliveryClient::new().with_base_delay(Duration::from_secs(5));
        let started = std::time::Instant::now();
        let err = c.send("not a url", &json!({}), 3).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Request(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
