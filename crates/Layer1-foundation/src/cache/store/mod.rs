//! Cache stores
//!
//! - `sqlite`: 내구성 저장소 (프로세스 재시작 간 공유)
//! - `file`: 키당 파일 하나 - 내구성 저장소 장애 시에만 사용

mod file;
mod sqlite;

pub use file::FileCacheStore;
pub use sqlite::SqliteCacheStore;

use super::fingerprint::CacheKey;
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// A cache row as written by the façade
///
/// Entries are never mutated in place; writing the same key again replaces
/// payload and expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Serialized JSON payload
    pub payload: String,
    pub request_class: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What a store hands back on a hit
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPayload {
    pub payload: String,
    pub expires_at: DateTime<Utc>,
}

/// Keyed store with get-if-unexpired / upsert / sweep
///
/// `get` must treat `now >= expires_at` as absent. Errors are infrastructure
/// failures only; "not found" is `Ok(None)`.
pub trait CacheStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &'static str;

    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<StoredPayload>>;

    /// Insert or replace the entry for `entry.key`
    fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// Physically remove expired (and unreadable) records, returns the count
    fn sweep(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Stand-in for a durable store that could not be opened
///
/// Every call fails, so the façade degrades to the fallback store exactly as
/// it would during a runtime outage.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> Error {
        Error::Storage(format!("store unavailable: {}", self.reason))
    }
}

impl CacheStore for UnavailableStore {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn get(&self, _: &CacheKey, _: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        Err(self.error())
    }

    fn upsert(&self, _: &CacheEntry) -> Result<()> {
        Err(self.error())
    }

    fn sweep(&self, _: DateTime<Utc>) -> Result<usize> {
        Err(self.error())
    }
}

/// RFC 3339, UTC, fixed microsecond precision
///
/// Fixed width keeps lexicographic order equal to chronological order, which
/// the SQLite store relies on for `expires_at > ?` comparisons.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::CorruptRecord(format!("bad timestamp '{}': {}", raw, e)))
}
