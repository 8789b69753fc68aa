// src/record.rs
//! Canonical Record: one news item or draw event, keyed by canonical field name.
//!
//! Values stay loosely typed (`serde_json::Value`) until the validator cleans
//! them; typed accessors below are for code that runs after cleaning
//! (publisher, notifier).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HEADLINE: &str = "headline";
pub const SUMMARY: &str = "summary";
pub const DATE: &str = "date";
pub const CATEGORY: &str = "category";
pub const IMPACT: &str = "impact";
pub const SOURCE: &str = "source";
pub const SOURCE_URL: &str = "source_url";
pub const CUTOFF: &str = "cutoff";
pub const INVITATION: &str = "invitation";
pub const WEEK_OF_YEAR: &str = "week_of_year";
pub const PROGRAM_AFFECTED: &str = "program_affected";
pub const DRAW_TYPE: &str = "draw_type";
pub const SLUG: &str = "slug";

/// Required text fields, in the order their errors are reported.
pub const REQUIRED_FIELDS: [&str; 5] = [HEADLINE, SUMMARY, DATE, CATEGORY, IMPACT];

/// Fields coerced to integers during cleaning.
pub const INTEGER_FIELDS: [&str; 3] = [CUTOFF, INVITATION, WEEK_OF_YEAR];

/// Fields holding ordered lists of text.
pub const LIST_FIELDS: [&str; 1] = [PROGRAM_AFFECTED];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// String value of a field; numbers and booleans are rendered as text.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Borrowed string value; `None` unless the field already holds a JSON string.
    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn list(&self, field: &str) -> Vec<String> {
        match self.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => Record::from_map(m),
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn null_fields_read_as_absent() {
        let r = rec(json!({ "headline": null, "summary": "s" }));
        assert!(!r.contains(HEADLINE));
        assert!(r.contains(SUMMARY));
    }

    #[test]
    fn text_renders_scalars() {
        let r = rec(json!({ "cutoff": 485, "flag": true, "list": ["a"] }));
        assert_eq!(r.text(CUTOFF).as_deref(), Some("485"));
        assert_eq!(r.text("flag").as_deref(), Some("true"));
        assert_eq!(r.text("list"), None);
    }

    #[test]
    fn list_accepts_single_string() {
        let r = rec(json!({ "program_affected": "CEC" }));
        assert_eq!(r.list(PROGRAM_AFFECTED), vec!["CEC".to_string()]);
    }
}
