//! Query filter/sort semantics for `Engine::list` (§4.6).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

/// Loose equality across primitive JSON types: `30 == "30"`,
/// `true == "true"`. Anything that isn't a primitive-to-primitive
/// coercion falls back to strict equality.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(flag), Value::String(s)) | (Value::String(s), Value::Bool(flag)) => {
            match s.as_str() {
                "true" => *flag,
                "false" => !*flag,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Whether `record` satisfies every `field == value` constraint in
/// `filter`.
pub fn matches(record: &serde_json::Map<String, Value>, filter: &BTreeMap<String, Value>) -> bool {
    filter.iter().all(|(field, expected)| {
        record
            .get(field)
            .map(|actual| loose_eq(actual, expected))
            .unwrap_or(false)
    })
}

/// Parses a sort spec (`"-created"`, `"title"`) into a field name and
/// direction.
pub fn parse_sort(spec: &str) -> (&str, bool) {
    match spec.strip_prefix('-') {
        Some(field) => (field, true),
        None => (spec, false),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

/// Stably sorts `records` by `field`, descending if `desc`.
pub fn sort_by_field(records: &mut [serde_json::Map<String, Value>], field: &str, desc: bool) {
    records.sort_by(|a, b| {
        let ord = compare_values(a.get(field), b.get(field));
        if desc {
            ord.reverse()
        } else {
            ord
        }
    });
}
