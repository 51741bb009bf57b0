//! Decoding of bundle compositions.
//!
//! Bundle plugins store their component list in several encodings over
//! time:
//! - a JSON array: `[{"id": 12, "qty": 2}, ...]`
//! - a JSON object keyed by arbitrary row keys: `{"k1": {"id": 12, "qty": 2}}`
//! - either of the above serialized into a string
//! - the legacy text form `"12/2,13/1"` (quantity optional, defaults to 1)
//!
//! Decoding never fails: anything unreadable yields `None` and the product
//! is stored without a composition.

use serde_json::{Map, Value};
use shopmirror_core::BundleComponent;

use crate::parse_helpers::{i32_from_value, i64_from_value};

const ID_KEYS: &[&str] = &["id", "product_id", "component_id"];
const QTY_KEYS: &[&str] = &["qty", "quantity"];

/// Decodes a stored composition into a flat component list.
///
/// Returns `None` for unreadable or empty input. Entries without a usable
/// positive id, or with a non-positive quantity, are skipped.
#[must_use]
pub fn decode_components(raw: &Value) -> Option<Vec<BundleComponent>> {
    let components = match raw {
        Value::Array(entries) => entries.iter().filter_map(decode_entry).collect(),
        Value::Object(rows) => rows.values().filter_map(decode_entry).collect(),
        Value::String(text) => return decode_text(text),
        Value::Number(_) => decode_entry(raw).into_iter().collect(),
        _ => Vec::new(),
    };

    (!components.is_empty()).then_some(components)
}

fn decode_text(text: &str) -> Option<Vec<BundleComponent>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return match serde_json::from_str::<Value>(trimmed) {
            Ok(nested @ (Value::Array(_) | Value::Object(_))) => decode_components(&nested),
            Ok(_) | Err(_) => {
                tracing::debug!(value = trimmed, "unreadable bundle composition");
                None
            }
        };
    }

    let components: Vec<BundleComponent> = trimmed
        .split(',')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '/');
            let id = parts.next()?.trim().parse::<i64>().ok()?;
            let quantity = match parts.next() {
                Some(q) => q.trim().parse::<i32>().ok()?,
                None => 1,
            };
            component(id, quantity)
        })
        .collect();

    (!components.is_empty()).then_some(components)
}

fn decode_entry(entry: &Value) -> Option<BundleComponent> {
    match entry {
        Value::Object(fields) => {
            let id = first_of(fields, ID_KEYS).and_then(i64_from_value)?;
            let quantity = match first_of(fields, QTY_KEYS) {
                Some(q) => i32_from_value(q)?,
                None => 1,
            };
            component(id, quantity)
        }
        Value::Number(_) | Value::String(_) => component(i64_from_value(entry)?, 1),
        _ => None,
    }
}

fn first_of<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| fields.get(*k))
}

fn component(component_id: i64, quantity: i32) -> Option<BundleComponent> {
    (component_id > 0 && quantity > 0).then_some(BundleComponent {
        component_id,
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(components: &[BundleComponent]) -> Vec<(i64, i32)> {
        components
            .iter()
            .map(|c| (c.component_id, c.quantity))
            .collect()
    }

    #[test]
    fn decodes_json_array() {
        let got = decode_components(&json!([{"id": 12, "qty": 2}, {"id": "13", "qty": "1"}]));
        assert_eq!(ids(&got.unwrap()), vec![(12, 2), (13, 1)]);
    }

    #[test]
    fn decodes_keyed_object() {
        let got = decode_components(&json!({
            "a1b2": {"id": 12, "qty": 2},
            "c3d4": {"product_id": 14}
        }));
        assert_eq!(ids(&got.unwrap()), vec![(12, 2), (14, 1)]);
    }

    #[test]
    fn decodes_json_inside_string() {
        let got = decode_components(&json!(r#"[{"id":7,"quantity":3}]"#));
        assert_eq!(ids(&got.unwrap()), vec![(7, 3)]);
    }

    #[test]
    fn decodes_legacy_text() {
        let got = decode_components(&json!("12/2, 13/1,14"));
        assert_eq!(ids(&got.unwrap()), vec![(12, 2), (13, 1), (14, 1)]);
    }

    #[test]
    fn unreadable_input_is_none() {
        assert!(decode_components(&json!("")).is_none());
        assert!(decode_components(&json!("not a bundle")).is_none());
        assert!(decode_components(&json!("[broken")).is_none());
        assert!(decode_components(&json!([])).is_none());
        assert!(decode_components(&json!(null)).is_none());
        assert!(decode_components(&json!([{"qty": 2}])).is_none());
    }

    #[test]
    fn skips_invalid_entries_but_keeps_valid_ones() {
        let got = decode_components(&json!([{"id": 0}, {"id": 5, "qty": 0}, {"id": 6}]));
        assert_eq!(ids(&got.unwrap()), vec![(6, 1)]);
    }
}
