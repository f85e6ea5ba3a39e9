//! Canonical form of a [`Value`]
//!
//! Deterministic rendering with object keys sorted, used for hashing,
//! comparison, and deduplication independent of member order.

use sha2::{Digest, Sha256};

use crate::render::{write_float, write_string};
use crate::value::Value;

/// Compact JSON with object keys sorted by code point
pub fn canonicalize(v: &Value) -> String {
    let mut buf = String::new();
    write_canon(&mut buf, v);
    buf
}

/// SHA-256 of the canonical form (first 16 hex chars)
pub fn fingerprint(v: &Value) -> String {
    let canonical = canonicalize(v);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Check if two values have the same canonical form
pub fn equal_canonical(a: &Value, b: &Value) -> bool {
    canonicalize(a) == canonicalize(b)
}

fn write_canon(buf: &mut String, v: &Value) {
    match v {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => buf.push_str(&n.to_string()),
        Value::Float(f) => write_float(buf, *f),
        Value::String(s) => write_string(buf, s, false),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canon(buf, item);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));

            buf.push('{');
            for (i, (key, value)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_string(buf, key, false);
                buf.push(':');
                write_canon(buf, value);
            }
            buf.push('}');
        }
    }
}

impl Value {
    /// See [`canonicalize`]
    pub fn canonical(&self) -> String {
        canonicalize(self)
    }

    /// See [`fingerprint`]
    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }
}

mod hex {
    pub fn encode(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
