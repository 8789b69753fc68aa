// src/envelope.rs
//! Inbound trigger shapes.
//!
//! Automations post one of:
//! - `{ "record":  { "fields": {...} } }`
//! - `{ "records": [ { "fields": {...} }, ... ] }`
//! - `{ "fields":  {...} }`
//! - a flat object whose keys are the fields themselves

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
struct FieldsWrapper {
    fields: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TriggerAny {
    Single { record: FieldsWrapper },
    Batch { records: Vec<Value> },
    Fields(FieldsWrapper),
    Direct(Map<String, Value>),
}

/// Normalized trigger: the field objects it carried, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Single(Map<String, Value>),
    Batch(Vec<Map<String, Value>>),
}

impl Envelope {
    /// Detect the trigger shape. Returns `None` for non-objects and for
    /// envelopes without any usable field object.
    pub fn detect(raw: &Value) -> Option<Self> {
        let any: TriggerAny = serde_json::from_value(raw.clone()).ok()?;
        match any {
            TriggerAny::Single { record } => non_empty(record.fields).map(Envelope::Single),
            TriggerAny::Batch { records } => {
                let items: Vec<_> = records.iter().filter_map(batch_item).collect();
                if items.is_empty() {
                    None
                } else {
                    Some(Envelope::Batch(items))
                }
            }
            TriggerAny::Fields(w) => non_empty(w.fields).map(Envelope::Single),
            TriggerAny::Direct(m) => non_empty(m).map(Envelope::Single),
        }
    }

    pub fn first(&self) -> Option<&Map<String, Value>> {
        match self {
            Envelope::Single(m) => Some(m),
            Envelope::Batch(v) => v.first(),
        }
    }

    pub fn into_records(self) -> Vec<Map<String, Value>> {
        match self {
            Envelope::Single(m) => vec![m],
            Envelope::Batch(v) => v,
        }
    }
}

/// First usable field object of any trigger shape.
pub fn extract_first(raw: &Value) -> Option<Map<String, Value>> {
    Envelope::detect(raw).and_then(|e| e.first().cloned())
}

fn batch_item(v: &Value) -> Option<Map<String, Value>> {
    let obj = v.as_object()?;
    match obj.get("fields") {
        Some(Value::Object(fields)) => non_empty(fields.clone()),
        _ => None,
    }
}

fn non_empty(m: Map<String, Value>) -> Option<Map<String, Value>> {
    if m.is_empty() {
        None
    } else {
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_single_record_wrapper() {
        let raw = json!({ "record": { "id": "rec1", "fields": { "Headline": "A" } } });
        let env = Envelope::detect(&raw).unwrap();
        assert_eq!(env.first().unwrap().get("Headline"), Some(&json!("A")));
    }

    #[test]
    fn batch_skips_items_without_fields() {
        let raw = json!({ "records": [ { "id": "x" }, { "fields": { "Headline": "B" } } ] });
        match Envelope::detect(&raw).unwrap() {
            Envelope::Batch(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].get("Headline"), Some(&json!("B")));
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn flat_fields_and_direct_objects() {
        let fields = json!({ "fields": { "Headline": "C" } });
        assert_eq!(
            extract_first(&fields).unwrap().get("Headline"),
            Some(&json!("C"))
        );
        let direct = json!({ "Headline": "D", "Impact": "high" });
        assert_eq!(extract_first(&direct).unwrap().len(), 2);
    }

    #[test]
    fn rejects_non_objects_and_empty_envelopes() {
        assert!(extract_first(&json!([1, 2])).is_none());
        assert!(extract_first(&json!("text")).is_none());
        assert!(extract_first(&json!({})).is_none());
        assert!(extract_first(&json!({ "records": [] })).is_none());
    }
}
