//! Audit records and canonical serialization.

use palisade_engine::Decision;
use serde::{Deserialize, Serialize};

/// One decision as delivered to sinks: the decision itself plus its
/// position in the tamper-evidence chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Monotonic position in the dispatcher's chain, starting at 0.
    pub sequence: u64,
    /// Hex SHA-256 of the previous record; all-zero for the first.
    pub prev_hash: String,
    /// Hex SHA-256 over (`prev_hash`, `sequence`, canonical decision).
    pub record_hash: String,
    /// Retention metadata for the sink/storage layer; not enforced here.
    pub retention_days: u32,
    pub decision: Decision,
}

impl AuditRecord {
    /// The record as one canonical JSON line (keys sorted, no newline).
    pub fn to_canonical_line(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        Ok(canonical_json(&value))
    }
}

/// Serializes a JSON value with object keys in sorted order.
///
/// `serde_json` preserves insertion order by default; audit output must be
/// byte-reproducible across runs, so maps are rewritten through a sorted
/// form before printing.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Key strings round-trip through serde_json for escaping.
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys_recursively() {
        let value = json!({
            "zulu": 1,
            "alpha": { "delta": [{"b": 2, "a": 1}], "charlie": true }
        });
        assert_eq!(
            canonical_json(&value),
            r#"{"alpha":{"charlie":true,"delta":[{"a":1,"b":2}]},"zulu":1}"#
        );
    }

    #[test]
    fn test_canonical_json_is_stable_across_insertion_orders() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"x": 1, "y": {"b": 2, "a": 3}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"y": {"a": 3, "b": 2}, "x": 1}"#).unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn test_canonical_json_escapes_keys() {
        let value = json!({ "quote\"key": "v" });
        assert_eq!(canonical_json(&value), r#"{"quote\"key":"v"}"#);
    }
}
