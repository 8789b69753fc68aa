// src/pipeline.rs
//! Orchestrator: trigger envelope → field mapping → validation → dispatch
//! and/or publish → notification.
//!
//! Nothing here returns `Err`; every run ends in an [`Outcome`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::PipelineConfig;
use crate::delivery::{Delivered, DispatchClient};
use crate::envelope::Envelope;
use crate::mapper::FieldMapper;
use crate::notify::{NoopNotifier, Notifier, StatusKind, StatusMessage};
use crate::publish::Publisher;
use crate::record::Record;
use crate::validate::Validator;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Cleaned record (or the mapped one when validation failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivered>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_path: Option<PathBuf>,
}

impl Outcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

pub struct Pipeline {
    mapper: FieldMapper,
    validator: Validator,
    dispatch: Option<DispatchClient>,
    publisher: Option<Publisher>,
    notifier: Arc<dyn Notifier>,
    batch_delay: Duration,
}

impl Pipeline {
    pub fn new(mapper: FieldMapper, validator: Validator) -> Self {
        Self {
            mapper,
            validator,
            dispatch: None,
            publisher: None,
            notifier: Arc::new(NoopNotifier),
            batch_delay: Duration::from_secs(1),
        }
    }

    /// Mapper, validator, notifier and dispatch target from config. The
    /// publisher is opt-in via [`Pipeline::with_publisher`].
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        let mut p = Self::new(cfg.build_mapper(), cfg.build_validator())
            .with_notifier(cfg.build_notifier())
            .with_batch_delay(cfg.batch_delay());
        if let Some(d) = cfg.build_dispatch() {
            p = p.with_dispatch(d);
        }
        p
    }

    pub fn with_dispatch(mut self, dispatch: DispatchClient) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Run the first usable record of any supported trigger shape.
    pub async fn process(&self, trigger: &Value) -> Outcome {
        crate::metrics::describe();
        match Envelope::detect(trigger) {
            Some(env) => match env.first() {
                Some(fields) => self.process_fields(fields).await,
                None => Outcome::failed("No usable record in trigger payload"),
            },
            None => Outcome::failed("No usable record in trigger payload"),
        }
    }

    /// Run every record of the trigger, strictly in order, pausing
    /// `batch_delay` between records.
    pub async fn process_batch(&self, trigger: &Value) -> Vec<Outcome> {
        crate::metrics::describe();
        let Some(env) = Envelope::detect(trigger) else {
            return vec![Outcome::failed("No usable record in trigger payload")];
        };
        let records = env.into_records();
        let total = records.len();
        let mut out = Vec::with_capacity(total);
        for (i, fields) in records.iter().enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            tracing::info!(index = i + 1, total, "processing batch record");
            out.push(self.process_fields(fields).await);
        }
        out
    }

    pub async fn process_fields(&self, fields: &Map<String, Value>) -> Outcome {
        counter!("pipeline_records_total").increment(1);

        let mapped = self.mapper.map(fields);
        let v = self.validator.validate(&mapped);

        if !v.is_valid {
            counter!("pipeline_invalid_total").increment(1);
            tracing::info!(errors = ?v.errors, "record rejected by validation");
            let mut outcome = Outcome {
                success: false,
                errors: v.errors,
                warnings: v.warnings,
                record: Some(v.cleaned),
                ..Default::default()
            };
            if let (Some(publisher), Some(rec)) = (&self.publisher, &outcome.record) {
                match publisher.write_draft(rec, &outcome.errors).await {
                    Ok(path) => {
                        let msg = StatusMessage::for_record(StatusKind::Draft, rec)
                            .with_details(outcome.errors.clone());
                        self.notifier.notify(&msg).await;
                        outcome.draft_path = Some(path);
                    }
                    Err(e) => tracing::warn!(error = ?e, "could not write draft report"),
                }
            }
            return outcome;
        }

        for w in &v.warnings {
            tracing::warn!(warning = %w, "record quality warning");
        }

        let rec = v.cleaned;
        let mut outcome = Outcome {
            success: true,
            warnings: v.warnings,
            ..Default::default()
        };

        if let Some(dispatch) = &self.dispatch {
            match dispatch.dispatch(&rec).await {
                Ok(delivered) => {
                    counter!("pipeline_dispatched_total").increment(1);
                    outcome.delivery = Some(delivered);
                }
                Err(e) => {
                    let error = format!("Delivery failed: {e}");
                    let msg = StatusMessage::for_record(StatusKind::Failed, &rec)
                        .with_details(vec![error.clone()]);
                    outcome.success = false;
                    outcome.error = Some(error);
                    outcome.record = Some(rec);
                    self.notifier.notify(&msg).await;
                    return outcome;
                }
            }
        }

        if let Some(publisher) = &self.publisher {
            match publisher.publish(&rec).await {
                Ok(published) => {
                    counter!("pipeline_published_total").increment(1);
                    outcome.article_url = Some(published.article_url);
                }
                Err(e) => {
                    let error = format!("Article publication failed: {e:#}");
                    match publisher.write_draft(&rec, std::slice::from_ref(&error)).await {
                        Ok(path) => outcome.draft_path = Some(path),
                        Err(e) => tracing::warn!(error = ?e, "could not write draft report"),
                    }
                    let msg = StatusMessage::for_record(StatusKind::Failed, &rec)
                        .with_details(vec![error.clone()]);
                    outcome.success = false;
                    outcome.error = Some(error);
                    outcome.record = Some(rec);
                    self.notifier.notify(&msg).await;
                    return outcome;
                }
            }
        }

        if self.dispatch.is_none() && self.publisher.is_none() {
            tracing::info!("no dispatch target or publisher configured; validated only");
        } else {
            let kind = if outcome.article_url.is_some() {
                StatusKind::Published
            } else {
                StatusKind::Dispatched
            };
            let mut msg = StatusMessage::for_record(kind, &rec);
            if let Some(url) = &outcome.article_url {
                msg = msg.with_article_url(url.clone());
            }
            self.notifier.notify(&msg).await;
        }

        outcome.record = Some(rec);
        outcome
    }
}
