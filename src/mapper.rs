// src/mapper.rs
//! Declarative field mapping from external (Airtable display) labels to
//! canonical Record fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{self, Record};

/// One canonical field and the external labels that feed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub canonical: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Value used when no label is present in the input.
    #[serde(default)]
    pub default: Option<Value>,
    /// Restrict the default to these (lowercase) categories. Empty = always.
    #[serde(default)]
    pub default_for_categories: Vec<String>,
}

impl FieldRule {
    pub fn new(canonical: &str, labels: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            default: None,
            default_for_categories: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn only_for(mut self, categories: &[&str]) -> Self {
        self.default_for_categories = categories.iter().map(|c| c.to_ascii_lowercase()).collect();
        self
    }

    fn lookup<'a>(&self, input: &'a Map<String, Value>) -> Option<&'a Value> {
        let candidates = self
            .labels
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.canonical.as_str()));

        // Exact label wins; fall back to a case/whitespace-insensitive match.
        for label in candidates.clone() {
            if let Some(v) = input.get(label).filter(|v| !v.is_null()) {
                return Some(v);
            }
        }
        for label in candidates {
            let want = normalize_label(label);
            if let Some((_, v)) = input
                .iter()
                .find(|(k, v)| !v.is_null() && normalize_label(k) == want)
            {
                return Some(v);
            }
        }
        None
    }

    fn default_applies(&self, category: Option<&str>) -> bool {
        if self.default_for_categories.is_empty() {
            return true;
        }
        category
            .map(|c| c.trim().to_ascii_lowercase())
            .is_some_and(|c| self.default_for_categories.iter().any(|d| *d == c))
    }
}

fn normalize_label(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|p| !p.is_empty())
        .map(|p| p.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapper {
    pub rules: Vec<FieldRule>,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::airtable_news()
    }
}

impl FieldMapper {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Airtable news/draw base: display labels plus snake_case aliases.
    pub fn airtable_news() -> Self {
        Self::new(vec![
            FieldRule::new(record::HEADLINE, &["Headline", "Title"]),
            FieldRule::new(record::SUMMARY, &["Summary"]),
            FieldRule::new(record::DATE, &["Date of Update", "date_of_update", "Date"]),
            FieldRule::new(record::CATEGORY, &["Category"]),
            FieldRule::new(record::IMPACT, &["Impact", "Impact Level"]),
            FieldRule::new(record::SOURCE, &["Source"]).with_default("IRCC"),
            FieldRule::new(record::SOURCE_URL, &["Source URL", "Source Link"]),
            FieldRule::new(record::CUTOFF, &["Cutoff", "CRS Cutoff", "CRS"]),
            FieldRule::new(record::INVITATION, &["Invitation", "Invitations", "ITAs"]),
            FieldRule::new(record::WEEK_OF_YEAR, &["Week of Year", "Week"]),
            FieldRule::new(record::PROGRAM_AFFECTED, &["Program Affected", "Programs"]),
            FieldRule::new(record::DRAW_TYPE, &["Draw Type"])
                .with_default("General")
                .only_for(&["draw", "draws"]),
        ])
    }

    /// Map an external field object into a canonical Record. Pure; absent
    /// fields stay absent unless their rule carries an applicable default.
    pub fn map(&self, input: &Map<String, Value>) -> Record {
        let mut out = Record::new();
        let mut deferred = Vec::new();

        for rule in &self.rules {
            match rule.lookup(input) {
                Some(v) => out.insert(rule.canonical.clone(), v.clone()),
                None if rule.default.is_some() => deferred.push(rule),
                None => {}
            }
        }

        // Category-scoped defaults need the mapped category.
        let category = out.text(record::CATEGORY);
        for rule in deferred {
            if rule.default_applies(category.as_deref()) {
                if let Some(d) = &rule.default {
                    out.insert(rule.canonical.clone(), d.clone());
                }
            }
        }
        out
    }
}
