//! Request fingerprinting for cache keys
//!
//! A fingerprint is the SHA-256 of `request_class || 0x00 || canonical_json(request)`.
//! Canonical JSON sorts object keys at every depth and carries no whitespace,
//! so two structurally equal requests produce the same key regardless of the
//! order their maps were built in.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex length of a [`CacheKey`]
pub const CACHE_KEY_LEN: usize = 64;

/// Opaque, fixed-length cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already computed digest (e.g. a file stem read back from disk)
    ///
    /// Returns `None` unless `hex` is exactly 64 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == CACHE_KEY_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the cache key for `request` under `request_class`
///
/// Fails only when `request` cannot be represented as JSON
/// (for instance a map keyed by a non-string type).
pub fn fingerprint<T: Serialize + ?Sized>(request_class: &str, request: &T) -> Result<CacheKey> {
    let value = serde_json::to_value(request)
        .map_err(|e| Error::InvalidInput(format!("request is not canonicalizable: {}", e)))?;
    Ok(fingerprint_value(request_class, &value))
}

/// Compute the cache key for an already materialized JSON value
pub fn fingerprint_value(request_class: &str, value: &Value) -> CacheKey {
    let mut canonical = String::with_capacity(128);
    write_canonical(value, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(request_class.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    CacheKey(format!("{:x}", hasher.finalize()))
}

/// Canonical JSON rendering with sorted keys
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            // Scalars use serde_json's own escaping/number rendering
            out.push_str(&value.to_string());
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
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}
