// src/delivery/dispatch.rs
use serde::Serialize;

use super::{Delivered, DeliveryClient, DeliveryError};
use crate::record::Record;

pub const DEFAULT_EVENT_TYPE: &str = "news_update";

/// Repository-dispatch body.
#[derive(Debug, Serialize)]
pub struct DispatchPayload<'a> {
    pub event_type: &'a str,
    pub client_payload: &'a Record,
}

/// Sends cleaned records as repository-dispatch events.
#[derive(Clone, Debug)]
pub struct DispatchClient {
    delivery: DeliveryClient,
    url: String,
    event_type: String,
}

impl DispatchClient {
    pub fn new(url: impl Into<String>, delivery: DeliveryClient) -> Self {
        Self {
            delivery,
            url: url.into(),
            event_type: DEFAULT_EVENT_TYPE.to_string(),
        }
    }

    /// Dispatch endpoint of a GitHub repository, authenticated with `token`.
    pub fn github(repository: &str, token: &str, delivery: DeliveryClient) -> Self {
        let delivery = delivery
            .with_token(token)
            .with_header("accept", "application/vnd.github.v3+json");
        Self::new(github_dispatch_url(repository), delivery)
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub async fn dispatch(&self, record: &Record) -> Result<Delivered, DeliveryError> {
        let payload = DispatchPayload {
            event_type: &self.event_type,
            client_payload: record,
        };
        tracing::info!(url = %self.url, event_type = %self.event_type, "sending repository dispatch");
        self.delivery.deliver(&self.url, &payload).await
    }
}

/// `owner/repo` → `https://api.github.com/repos/owner/repo/dispatches`.
pub fn github_dispatch_url(repository: &str) -> String {
    format!(
        "https://api.github.com/repos/{}/dispatches",
        repository.trim().trim_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn github_url_from_repository() {
        assert_eq!(
            github_dispatch_url("/getguide/immiwatch/"),
            "https://api.github.com/repos/getguide/immiwatch/dispatches"
        );
    }

    #[test]
    fn payload_shape() {
        let mut r = Record::new();
        r.insert("headline", "X");
        let p = DispatchPayload {
            event_type: "express_entry_draw",
            client_payload: &r,
        };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({ "event_type": "express_entry_draw", "client_payload": { "headline": "X" } })
        );
    }
}
