//! Canonical key encoding (§4.8).
//!
//! All keys are UTF-8 strings over the ordered KV substrate. Three
//! shapes are defined: primary rows, secondary-index entries, and
//! uniqueness entries. Range scans over a prefix use the prefix as the
//! inclusive low end and the prefix with `"\xFF"` appended as the high
//! end — `'\u{FF}'` sorts after every ASCII byte a collection, field,
//! or id token can contain.

use serde_json::Value;

/// High-end sentinel appended to a prefix for an inclusive-low,
/// exclusive-high range scan.
pub const PREFIX_SENTINEL: char = '\u{FF}';

/// Width (in digits) numeric index values are zero-padded to so that
/// lexicographic order matches numeric order.
pub const NUMERIC_PAD_WIDTH: usize = 20;

/// Primary row key: `<collection>:<id>`.
pub fn primary_key(collection: &str, id: &str) -> String {
    format!("{collection}:{id}")
}

/// Prefix (and its scan bound) for every primary row in a collection.
pub fn primary_prefix(collection: &str) -> String {
    format!("{collection}:")
}

/// Secondary-index key: `idx:<collection>:<field>:<normValue>:<id>`.
pub fn index_key(collection: &str, field: &str, norm_value: &str, id: &str) -> String {
    format!("idx:{collection}:{field}:{norm_value}:{id}")
}

/// Prefix selecting every index entry for one `(collection, field, value)`.
pub fn index_value_prefix(collection: &str, field: &str, norm_value: &str) -> String {
    format!("idx:{collection}:{field}:{norm_value}:")
}

/// Prefix selecting every index entry for one `(collection, field)`,
/// across all values — used by `list` for unbounded range scans is not
/// needed since filters always pin a value, but schema maintenance
/// (dropping a field) needs to enumerate the whole field index.
pub fn index_field_prefix(collection: &str, field: &str) -> String {
    format!("idx:{collection}:{field}:")
}

/// Uniqueness key: `uniq:<collection>:<field>:<normValue>`.
pub fn uniqueness_key(collection: &str, field: &str, norm_value: &str) -> String {
    format!("uniq:{collection}:{field}:{norm_value}")
}

/// Normalizes a JSON value for use inside an index or uniqueness key.
///
/// Numbers are left-padded to `NUMERIC_PAD_WIDTH` digits so that a
/// lexicographic range scan over the index keyspace preserves numeric
/// order; negative numbers are offset so their padded form still
/// sorts correctly relative to non-negative numbers (see
/// `pad_number`). Strings and booleans pass through as their plain
/// textual form.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Number(n) => pad_number(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Left-pads a number into a fixed-width, order-preserving decimal
/// string. A bias of `10^15` is added before padding so that numbers
/// in the (generous) supported range never go negative after the
/// shift, keeping the encoding purely lexicographic.
fn pad_number(n: f64) -> String {
    const BIAS: f64 = 1_000_000_000_000_000.0;
    let shifted = n + BIAS;
    format!("{:0width$.6}", shifted, width = NUMERIC_PAD_WIDTH + 7)
}

/// Appends the high-end sentinel to a prefix, yielding the exclusive
/// upper bound for a `KvStore::range` scan over that prefix.
pub fn prefix_range_end(prefix: &str) -> String {
    format!("{prefix}{PREFIX_SENTINEL}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_shape() {
        assert_eq!(primary_key("posts", "abc123"), "posts:abc123");
        assert_eq!(primary_prefix("posts"), "posts:");
    }

    #[test]
    fn index_key_shape() {
        assert_eq!(
            index_key("posts", "owner_id", "u1", "abc"),
            "idx:posts:owner_id:u1:abc"
        );
    }

    #[test]
    fn uniqueness_key_shape() {
        assert_eq!(uniqueness_key("users", "email", "x@y"), "uniq:users:email:x@y");
    }

    #[test]
    fn numeric_normalization_preserves_order() {
        let a = normalize_value(&Value::from(3));
        let b = normalize_value(&Value::from(20));
        let c = normalize_value(&Value::from(-5));
        let mut sorted = vec![c.clone(), a.clone(), b.clone()];
        sorted.sort();
        assert_eq!(sorted, vec![c, a, b]);
    }

    #[test]
    fn prefix_range_end_sorts_after_any_real_key() {
        let prefix = primary_prefix("posts");
        let end = prefix_range_end(&prefix);
        assert!("posts:zzzzzzzzzzzzzzz" < end.as_str());
        assert!(!("posts:zzzzzzzzzzzzzzz" < prefix.as_str()));
    }
}
