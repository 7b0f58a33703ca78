/// Canonical JSON serialization and content hashing
///
/// Record identity is derived from the SHA-256 of a canonical JSON rendering
/// of the record data: object keys sorted lexicographically at every nesting
/// level, arrays kept in order, scalars serialized with standard JSON rules.
/// Semantically identical values therefore always collide on hash, which is
/// the sole dedup/idempotence mechanism in the system.
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CoffeyError, CoffeyResult};

/// Render a JSON value in canonical form.
///
/// A key present with a `null` value is NOT the same as an omitted key; the
/// two canonicalize differently and so hash differently. Typed record structs
/// rely on `skip_serializing_if` to keep absent optionals out of the output.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys are strings; serde_json handles escaping
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
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

/// SHA-256 of the canonical rendering, as lowercase hex
pub fn hash_value(value: &Value) -> String {
    hash_bytes(canonicalize(value).as_bytes())
}

/// SHA-256 of raw bytes, as lowercase hex
pub fn hash_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Serialize any record data and hash its canonical form
pub fn hash_serializable<T: Serialize>(data: &T) -> CoffeyResult<String> {
    let value = serde_json::to_value(data)
        .map_err(|e| CoffeyError::Internal(format!("Failed to serialize record data: {}", e)))?;
    Ok(hash_value(&value))
}
