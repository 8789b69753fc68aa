// src/validate.rs
//! Record validation and cleaning.
//!
//! `Validator::validate` never fails: every outcome (errors, warnings and the
//! cleaned record) is carried in the returned `Validation`.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::record::{self, Record};

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "policy-announcements",
    "program-delivery",
    "invitation-rounds",
    "atip-insights",
    "legal-decisions",
    "system-notices",
    "form-changes",
    "deadline-alerts",
    "statistical-reports",
    "scam-alerts",
    "draws",
    "draw",
    "other",
];

pub const IMPACT_LEVELS: &[&str] = &["critical", "high", "moderate", "low", "informational"];

pub const DEFAULT_DRAW_CATEGORIES: &[&str] = &["draw", "draws"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_categories() -> Vec<String> {
    strings(DEFAULT_CATEGORIES)
}
fn default_impacts() -> Vec<String> {
    strings(IMPACT_LEVELS)
}
fn default_draw_categories() -> Vec<String> {
    strings(DEFAULT_DRAW_CATEGORIES)
}
fn default_headline_max() -> usize {
    200
}
fn default_summary_max() -> usize {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_impacts")]
    pub impacts: Vec<String>,
    /// Categories that require `cutoff` and `invitation`.
    #[serde(default = "default_draw_categories")]
    pub draw_categories: Vec<String>,
    #[serde(default = "default_headline_max")]
    pub headline_max_chars: usize,
    #[serde(default = "default_summary_max")]
    pub summary_max_chars: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            impacts: default_impacts(),
            draw_categories: default_draw_categories(),
            headline_max_chars: default_headline_max(),
            summary_max_chars: default_summary_max(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub cleaned: Record,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    cfg: ValidatorConfig,
}

fn date_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("static date regex"))
}

/// `YYYY-MM-DD` shape check only; `2025-13-40` passes.
pub fn is_date_format(s: &str) -> bool {
    date_re().is_match(s)
}

impl Validator {
    pub fn new(mut cfg: ValidatorConfig) -> Self {
        for set in [&mut cfg.categories, &mut cfg.impacts, &mut cfg.draw_categories] {
            for item in set.iter_mut() {
                *item = item.trim().to_ascii_lowercase();
            }
        }
        Self { cfg }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.cfg
    }

    pub fn is_draw_category(&self, category: &str) -> bool {
        self.cfg.draw_categories.iter().any(|c| c == category)
    }

    pub fn validate(&self, input: &Record) -> Validation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut cleaned = clean(input, &mut warnings);

        for field in record::REQUIRED_FIELDS {
            if !cleaned.contains(field) {
                errors.push(format!("Missing required field: {field}"));
            }
        }

        if let Some(category) = cleaned.str(record::CATEGORY) {
            if !self.cfg.categories.iter().any(|c| c == category) {
                errors.push(format!(
                    "Invalid category: {category}. Valid options: {}",
                    self.cfg.categories.join(", ")
                ));
            }
        }

        if let Some(impact) = cleaned.str(record::IMPACT) {
            if !self.cfg.impacts.iter().any(|i| i == impact) {
                errors.push(format!(
                    "Invalid impact: {impact}. Valid options: {}",
                    self.cfg.impacts.join(", ")
                ));
            }
        }

        if let Some(date) = cleaned.str(record::DATE) {
            if !is_date_format(date) {
                errors.push(format!("Invalid date format: {date}. Expected YYYY-MM-DD"));
            }
        }

        let is_draw = cleaned
            .str(record::CATEGORY)
            .is_some_and(|c| self.is_draw_category(c));

        for field in record::INTEGER_FIELDS {
            let Some(raw) = cleaned.get(field).cloned() else {
                if is_draw && field != record::WEEK_OF_YEAR {
                    errors.push(format!("Missing required field for draw: {field}"));
                }
                continue;
            };
            match coerce_int(&raw) {
                Some(n) => cleaned.insert(field, n),
                None if is_draw && field != record::WEEK_OF_YEAR => {
                    errors.push(format!("Invalid integer for {field}: {}", display(&raw)));
                }
                None => {
                    warnings.push(format!(
                        "Ignoring non-integer {field}: {}",
                        display(&raw)
                    ));
                    cleaned.remove(field);
                }
            }
        }

        if let Some(h) = cleaned.str(record::HEADLINE) {
            let n = h.chars().count();
            if n > self.cfg.headline_max_chars {
                warnings.push(format!(
                    "Headline is {n} characters (recommended max {})",
                    self.cfg.headline_max_chars
                ));
            }
        }
        if let Some(s) = cleaned.str(record::SUMMARY) {
            let n = s.chars().count();
            if n > self.cfg.summary_max_chars {
                warnings.push(format!(
                    "Summary is {n} characters (recommended max {})",
                    self.cfg.summary_max_chars
                ));
            }
        }
        if let Some(url) = cleaned.str(record::SOURCE_URL) {
            if reqwest::Url::parse(url).is_err() {
                warnings.push(format!("Invalid source_url: {url}"));
            }
        }

        Validation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            cleaned,
        }
    }
}

/// Shape-level cleaning shared by every record: trim text, drop nulls and
/// blanks, normalize list fields, lowercase the enum fields.
fn clean(input: &Record, warnings: &mut Vec<String>) -> Record {
    let mut out = Record::new();
    for (key, value) in input.iter() {
        let key = key.as_str();
        let cleaned = if record::LIST_FIELDS.contains(&key) {
            clean_list(value)
        } else if record::INTEGER_FIELDS.contains(&key) {
            clean_scalar(value, false)
        } else if record::REQUIRED_FIELDS.contains(&key) || is_text_field(key) {
            clean_scalar(value, true)
        } else {
            clean_other(value)
        };

        let Some(mut v) = cleaned else {
            if !value.is_null() && !is_blank(value) && !record::REQUIRED_FIELDS.contains(&key) {
                warnings.push(format!("Dropping unsupported value for {key}"));
            }
            continue;
        };
        if key == record::CATEGORY || key == record::IMPACT {
            if let Value::String(s) = &v {
                v = Value::String(s.to_lowercase());
            }
        }
        out.insert(key, v);
    }
    out
}

fn is_text_field(key: &str) -> bool {
    matches!(
        key,
        record::SOURCE | record::SOURCE_URL | record::DRAW_TYPE | record::SLUG
    )
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Text field: strings are trimmed, numbers/bools stringified when
/// `stringify` is set. Blank strings are dropped.
fn clean_scalar(v: &Value, stringify: bool) -> Option<Value> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| Value::String(t.to_string()))
        }
        Value::Number(n) if stringify => Some(Value::String(n.to_string())),
        Value::Bool(b) if stringify => Some(Value::String(b.to_string())),
        Value::Number(_) | Value::Bool(_) => Some(v.clone()),
        // Single-element lookup lists (Airtable linked records) carry one value.
        Value::Array(items) if items.len() == 1 => clean_scalar(&items[0], stringify),
        _ => None,
    }
}

fn clean_list(v: &Value) -> Option<Value> {
    let items: Vec<Value> = match v {
        Value::Array(items) => items
            .iter()
            .filter_map(|it| clean_scalar(it, true))
            .collect(),
        Value::String(_) => clean_scalar(v, true).into_iter().collect(),
        _ => Vec::new(),
    };
    (!items.is_empty()).then_some(Value::Array(items))
}

fn clean_other(v: &Value) -> Option<Value> {
    match v {
        Value::Null => None,
        Value::String(_) => clean_scalar(v, false),
        Value::Array(items) => {
            let kept: Vec<Value> = items
                .iter()
                .filter(|it| !it.is_null() && !is_blank(it))
                .map(|it| match it {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other.clone(),
                })
                .collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        other => Some(other.clone()),
    }
}

/// Integer coercion: integral numbers and numeric strings (optionally with
/// `,`/`_` thousands separators).
pub fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => number_to_int(n),
        Value::String(s) => {
            let digits: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
            if let Ok(n) = digits.parse::<i64>() {
                return Some(n);
            }
            let f: f64 = digits.parse().ok()?;
            float_to_int(f)
        }
        _ => None,
    }
}

fn number_to_int(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| n.as_f64().and_then(float_to_int))
}

fn float_to_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
