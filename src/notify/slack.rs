use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use reqwest::Client;
use serde_json::{json, Value};

use super::{Notifier, StatusMessage};

pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("SLACK_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            webhook_url: Some(url.into()),
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, url: &str, msg: &StatusMessage) -> Result<()> {
        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&slack_payload(msg))
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, msg: &StatusMessage) {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Slack disabled (no SLACK_WEBHOOK_URL)");
            return;
        };
        match self.post(url, msg).await {
            Ok(()) => tracing::info!(kind = ?msg.kind, "slack notification sent"),
            Err(e) => {
                counter!("notify_failures_total").increment(1);
                tracing::warn!(error = ?e, kind = ?msg.kind, "slack notification failed");
            }
        }
    }
}

/// Slack incoming-webhook message: header, section with the record summary,
/// context with the UTC timestamp.
pub fn slack_payload(msg: &StatusMessage) -> Value {
    let title = msg.title();
    let dash = || "n/a".to_string();

    let mut body = format!("*{}*", msg.headline.clone().unwrap_or_else(dash));
    let mut lines = vec![
        format!("*Category:* {}", msg.category.clone().unwrap_or_else(dash)),
        format!("*Impact:* {}", msg.impact.clone().unwrap_or_else(dash)),
        format!("*Date:* {}", msg.date.clone().unwrap_or_else(dash)),
        format!("*Source:* {}", msg.source.clone().unwrap_or_else(dash)),
    ];
    if let (Some(itas), Some(crs)) = (msg.invitation, msg.cutoff) {
        lines.push(format!("*ITAs Issued:* {}", crate::template::thousands(itas)));
        lines.push(format!("*CRS Cutoff:* {crs}"));
    }
    if let Some(url) = &msg.article_url {
        lines.push(format!("*Article URL:* {url}"));
    }
    for d in &msg.details {
        lines.push(format!("• {d}"));
    }
    body.push_str("\n\n");
    body.push_str(&lines.join("\n"));

    json!({
        "text": title,
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": title }
            },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": body }
            },
            {
                "type": "context",
                "elements": [
                    { "type": "mrkdwn", "text": format!("ImmiWatch pipeline • {}", msg.ts.to_rfc3339()) }
                ]
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::StatusKind;
    use crate::record::Record;

    #[test]
    fn payload_has_header_section_context() {
        let mut r = Record::new();
        r.insert("headline", "Draw");
        r.insert("cutoff", 485);
        r.insert("invitation", 2500);
        let msg = StatusMessage::for_record(StatusKind::Published, &r)
            .with_details(vec!["note".to_string()]);
        let p = slack_payload(&msg);

        assert_eq!(p["text"], "🎉 New Article Published!");
        let blocks = p["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[1]["type"], "section");
        assert_eq!(blocks[2]["type"], "context");

        let section = blocks[1]["text"]["text"].as_str().unwrap();
        assert!(section.starts_with("*Draw*"));
        assert!(section.contains("*ITAs Issued:* 2,500"));
        assert!(section.contains("*CRS Cutoff:* 485"));
        assert!(section.contains("• note"));
        let ctx = blocks[2]["elements"][0]["text"].as_str().unwrap();
        assert!(ctx.contains(&msg.ts.to_rfc3339()));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_swallowed() {
        // Port 9 (discard) on localhost is closed in test environments.
        let n = SlackNotifier::new("http://127.0.0.1:9/hook").with_timeout(2);
        let msg = StatusMessage::for_record(StatusKind::Failed, &Record::new());
        n.notify(&msg).await;
    }
}
