//! Canonical JSON serialization for payload fingerprinting.
//!
//! Objects are serialized with lexicographically sorted keys so the same
//! logical payload always produces the same bytes, and therefore the same
//! fingerprint. The fingerprint is a debugging/fallback identity, not the
//! primary idempotency key, but it must stay stable for the process
//! lifetime and across restarts.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Canonicalize a JSON value: sorted object keys, arrays in order,
/// compact separators.
pub fn canonicalize_json(value: &Value) -> String {
    let mut out = String::new();
    serialize_value(value, &mut out);
    out
}

fn serialize_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                serialize_string(key, out);
                out.push(':');
                serialize_value(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                serialize_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => serialize_string(s, out),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
    }
}

fn serialize_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => {
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
}

/// Stable content fingerprint: SHA-256 over the canonical form, truncated
/// to 32 hex characters.
pub fn payload_hash(payload: &Value) -> String {
    let canonical = canonicalize_json(payload);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}
