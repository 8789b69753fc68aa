// src/notify/mod.rs
//! Best-effort status notifications. A notifier never returns an error to its
//! caller; failures are logged and counted.

pub mod slack;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::{self, Record};

pub use slack::SlackNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Published,
    Dispatched,
    Draft,
    Failed,
}

/// One pipeline outcome, summarized for humans.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub headline: Option<String>,
    pub category: Option<String>,
    pub impact: Option<String>,
    pub date: Option<String>,
    pub source: Option<String>,
    pub cutoff: Option<i64>,
    pub invitation: Option<i64>,
    pub article_url: Option<String>,
    pub details: Vec<String>,
    pub ts: DateTime<Utc>,
}

impl StatusMessage {
    pub fn for_record(kind: StatusKind, rec: &Record) -> Self {
        Self {
            kind,
            headline: rec.text(record::HEADLINE),
            category: rec.text(record::CATEGORY),
            impact: rec.text(record::IMPACT),
            date: rec.text(record::DATE),
            source: rec.text(record::SOURCE),
            cutoff: rec.int(record::CUTOFF),
            invitation: rec.int(record::INVITATION),
            article_url: None,
            details: Vec::new(),
            ts: Utc::now(),
        }
    }

    pub fn with_article_url(mut self, url: impl Into<String>) -> Self {
        self.article_url = Some(url.into());
        self
    }

    pub fn with_details(mut self, details: impl IntoIterator<Item = String>) -> Self {
        self.details.extend(details);
        self
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            StatusKind::Published => "🎉 New Article Published!",
            StatusKind::Dispatched => "📤 Record Dispatched",
            StatusKind::Draft => "⚠️ Article Draft Created",
            StatusKind::Failed => "❌ Record Delivery Failed",
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the message if possible. Must not fail the caller.
    async fn notify(&self, msg: &StatusMessage);
}

/// Used when no chat webhook is configured.
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, msg: &StatusMessage) {
        tracing::debug!(kind = ?msg.kind, "notifications disabled");
    }
}
