// src/config.rs
//! Pipeline configuration: TOML or JSON file, then environment overrides.
//!
//! Lookup order for the file:
//! 1) $PIPELINE_CONFIG_PATH
//! 2) config/pipeline.toml
//! 3) config/pipeline.json
//! 4) built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::delivery::{dispatch, DeliveryClient, DispatchClient};
use crate::mapper::{FieldMapper, FieldRule};
use crate::notify::{NoopNotifier, Notifier, SlackNotifier};
use crate::publish::{Publisher, DEFAULT_BASE_URL};
use crate::validate::{Validator, ValidatorConfig};

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_batch_delay_ms() -> u64 {
    1000
}
fn default_event_type() -> String {
    dispatch::DEFAULT_EVENT_TYPE.to_string()
}
fn default_site_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Pause between records of a batch.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Explicit endpoint; wins over `repository`.
    #[serde(default)]
    pub url: Option<String>,
    /// `owner/repo` for the GitHub dispatch endpoint.
    #[serde(default)]
    pub repository: Option<String>,
    /// "ENV" means: read from GITHUB_TOKEN.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            url: None,
            repository: None,
            token: None,
            event_type: default_event_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub validator: ValidatorConfig,
    /// Custom mapping table; the built-in Airtable table when absent.
    #[serde(default)]
    pub mapping: Option<Vec<FieldRule>>,
    #[serde(default)]
    pub delivery: DeliverySettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub template_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            mapping: None,
            delivery: DeliverySettings::default(),
            dispatch: DispatchSettings::default(),
            slack_webhook_url: None,
            webhook_secret: None,
            site_root: default_site_root(),
            base_url: default_base_url(),
            template_path: None,
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, &ext)
            .with_context(|| format!("parsing pipeline config {}", path.display()))
    }

    /// File lookup (see module docs) followed by env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/pipeline.toml");
            let json_p = PathBuf::from("config/pipeline.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Environment variables win over file values when set and non-empty.
    pub fn apply_env(&mut self) {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());

        if let Some(v) = var("WEBHOOK_SECRET") {
            self.webhook_secret = Some(v);
        }
        if let Some(v) = var("SLACK_WEBHOOK_URL") {
            self.slack_webhook_url = Some(v);
        }
        if let Some(v) = var("DISPATCH_URL") {
            self.dispatch.url = Some(v);
        }
        if let Some(v) = var("GITHUB_DISPATCH_REPOSITORY") {
            self.dispatch.repository = Some(v);
        }
        if let Some(v) = var("DISPATCH_EVENT_TYPE") {
            self.dispatch.event_type = v;
        }
        if let Some(v) = var("SITE_ROOT") {
            self.site_root = PathBuf::from(v);
        }
        let token_from_env = self
            .dispatch
            .token
            .as_deref()
            .map_or(true, |t| t.trim().eq_ignore_ascii_case("env"));
        if token_from_env {
            self.dispatch.token = var("GITHUB_TOKEN");
        }
    }

    pub fn build_validator(&self) -> Validator {
        Validator::new(self.validator.clone())
    }

    pub fn build_mapper(&self) -> FieldMapper {
        match &self.mapping {
            Some(rules) if !rules.is_empty() => FieldMapper::new(rules.clone()),
            _ => FieldMapper::airtable_news(),
        }
    }

    pub fn build_delivery(&self) -> DeliveryClient {
        DeliveryClient::new()
            .with_timeout(Duration::from_secs(self.delivery.timeout_secs))
            .with_retries(self.delivery.max_retries)
            .with_base_delay(Duration::from_millis(self.delivery.base_delay_ms))
    }

    /// `None` when neither a dispatch URL nor a repository is configured, or
    /// when the repository target has no token.
    pub fn build_dispatch(&self) -> Option<DispatchClient> {
        let delivery = self.build_delivery();
        let token = self.dispatch.token.clone().unwrap_or_default();
        let client = match (&self.dispatch.url, &self.dispatch.repository) {
            (Some(url), _) => DispatchClient::new(url.clone(), delivery.with_token(&token)),
            (None, Some(repo)) if token.trim().is_empty() => {
                tracing::warn!(
                    repository = %repo,
                    "GITHUB_TOKEN not set; repository dispatch disabled"
                );
                return None;
            }
            (None, Some(repo)) => DispatchClient::github(repo, &token, delivery),
            (None, None) => return None,
        };
        Some(client.with_event_type(self.dispatch.event_type.clone()))
    }

    pub fn build_notifier(&self) -> Arc<dyn Notifier> {
        match &self.slack_webhook_url {
            Some(url) => Arc::new(SlackNotifier::new(url.clone())),
            None => Arc::new(NoopNotifier),
        }
    }

    pub async fn build_publisher(&self) -> Result<Publisher> {
        let publisher = Publisher::new(self.site_root.clone()).with_base_url(self.base_url.clone());
        match &self.template_path {
            Some(p) => publisher.load_template(p).await,
            None => Ok(publisher),
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.delivery.batch_delay_ms)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    match toml::from_str(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported pipeline config format: {toml_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = parse_config("", "toml").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.delivery.timeout_secs, 30);
        assert_eq!(cfg.delivery.max_retries, 3);
    }

    #[test]
    fn toml_sections_and_mapping_rules() {
        let s = r#"
            site_root = "/srv/site"

            [delivery]
            base_delay_ms = 250

            [dispatch]
            repository = "getguide/immiwatch"
            token = "ghp_test"
            event_type = "express_entry_draw"

            [[mapping]]
            canonical = "headline"
            labels = ["Title"]

            [[mapping]]
            canonical = "source"
            labels = ["Publisher"]
            default = "IRCC"
        "#;
        let cfg = parse_config(s, "toml").unwrap();
        assert_eq!(cfg.site_root, PathBuf::from("/srv/site"));
        assert_eq!(cfg.delivery.base_delay_ms, 250);
        assert_eq!(cfg.delivery.max_retries, 3);
        let mapper = cfg.build_mapper();
        assert_eq!(mapper.rules.len(), 2);
        assert_eq!(mapper.rules[1].default, Some(serde_json::json!("IRCC")));

        let d = cfg.build_dispatch().unwrap();
        assert_eq!(d.url(), "https://api.github.com/repos/getguide/immiwatch/dispatches");
        assert_eq!(d.event_type(), "express_entry_draw");
    }

    #[test]
    fn json_is_accepted_without_extension_hint() {
        let cfg = parse_config(r#"{ "base_url": "https://example.org" }"#, "").unwrap();
        assert_eq!(cfg.base_url, "https://example.org");
    }

    #[test]
    fn repository_without_token_means_no_client() {
        let mut cfg = PipelineConfig::default();
        cfg.dispatch.repository = Some("getguide/immiwatch".into());
        assert!(cfg.build_dispatch().is_none());

        cfg.dispatch.token = Some("   ".into());
        assert!(cfg.build_dispatch().is_none());

        cfg.dispatch.token = Some("ghp_x".into());
        assert!(cfg.build_dispatch().is_some());
    }

    #[test]
    fn explicit_url_works_without_token() {
        let mut cfg = PipelineConfig::default();
        cfg.dispatch.url = Some("http://127.0.0.1:9/hook".into());
        assert_eq!(cfg.build_dispatch().unwrap().url(), "http://127.0.0.1:9/hook");
    }

    #[test]
    fn no_dispatch_target_means_no_client() {
        assert!(PipelineConfig::default().build_dispatch().is_none());
    }
}
