//! Canonical serialization and forensic digests.
//!
//! All three audit digests (input, output, context) are SHA-256 rendered
//! as lowercase hex over a canonical byte representation: object keys
//! sorted, integers big-endian fixed-width, strings UTF-8 with trailing
//! whitespace stripped. Re-serialising the same logical value always
//! yields the same bytes, so re-hashing is stable.

use serde::Serialize;
use sha2::{Digest, Sha256};

// ============================================================================
// DIGEST PRIMITIVES
// ============================================================================

/// SHA-256 content hash as raw bytes.
pub type ContentHash = [u8; 32];

/// Compute SHA-256 over raw bytes.
pub fn sha256_bytes(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute SHA-256 over raw bytes, rendered as lowercase hex.
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(sha256_bytes(content))
}

// ============================================================================
// CANONICAL ENCODER
// ============================================================================

// Type tags keep the encoding self-delimiting so that adjacent values
// cannot collide (e.g. "ab" + "c" vs "a" + "bc").
const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_ARRAY: u8 = 0x05;
const TAG_OBJECT: u8 = 0x06;

/// Encode a JSON value into its canonical byte form.
///
/// Object keys are visited in sorted order regardless of insertion order;
/// integers are 8-byte big-endian; strings are UTF-8 with trailing
/// whitespace stripped.
pub fn canonical_bytes(value: &serde_json::Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value(value, &mut out);
    out
}

/// Canonicalise any serialisable value and return its digest, lowercase hex.
pub fn canonical_hash<T: Serialize>(value: &T) -> String {
    // Serialisation into Value cannot fail for the plain data types this
    // crate defines; fall back to hashing the Display form if it ever does.
    match serde_json::to_value(value) {
        Ok(v) => sha256_hex(&canonical_bytes(&v)),
        Err(_) => sha256_hex(b"unserialisable"),
    }
}

fn encode_value(value: &serde_json::Value, out: &mut Vec<u8>) {
    match value {
        serde_json::Value::Null => out.push(TAG_NULL),
        serde_json::Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push(TAG_INT);
                out.extend_from_slice(&i.to_be_bytes());
            } else if let Some(u) = n.as_u64() {
                out.push(TAG_INT);
                out.extend_from_slice(&(u as i64).to_be_bytes());
            } else {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&n.as_f64().unwrap_or(0.0).to_be_bytes());
            }
        }
        serde_json::Value::String(s) => {
            encode_str(s, out);
        }
        serde_json::Value::Array(items) => {
            out.push(TAG_ARRAY);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_value(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            out.push(TAG_OBJECT);
            out.extend_from_slice(&(map.len() as u32).to_be_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                encode_str(key, out);
                encode_value(&map[key], out);
            }
        }
    }
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    let trimmed = s.trim_end();
    out.push(TAG_STRING);
    out.extend_from_slice(&(trimmed.len() as u32).to_be_bytes());
    out.extend_from_slice(trimmed.as_bytes());
}

// ============================================================================
// AUDIT DIGESTS
// ============================================================================

/// Canonical separator used when joining source ids for the context hash.
pub const CONTEXT_JOIN_SEPARATOR: &str = "\n";

/// Normalise a user query for hashing: trim and collapse internal
/// whitespace runs to single spaces.
pub fn normalise_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Input digest over (normalised query, sorted tenant+user ids, canonical
/// configuration bytes).
pub fn input_hash<T: Serialize>(
    query: &str,
    tenant_id: &str,
    user_id: Option<&str>,
    config: &T,
) -> String {
    let mut ids: Vec<&str> = match user_id {
        Some(u) => vec![tenant_id, u],
        None => vec![tenant_id],
    };
    ids.sort_unstable();

    let mut bytes = Vec::new();
    encode_str(&normalise_query(query), &mut bytes);
    for id in ids {
        encode_str(id, &mut bytes);
    }
    if let Ok(v) = serde_json::to_value(config) {
        encode_value(&v, &mut bytes);
    }
    sha256_hex(&bytes)
}

/// Output digest over the final text.
pub fn output_hash(final_text: &str) -> String {
    sha256_hex(final_text.as_bytes())
}

/// Context digest over the sorted, deduplicated list of source ids
/// actually consumed, joined by the canonical separator.
pub fn context_hash<I, S>(source_ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<String> = source_ids
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    sha256_hex(ids.join(CONTEXT_JOIN_SEPARATOR).as_bytes())
}

// ============================================================================
// TESTS
// ============================================================================
