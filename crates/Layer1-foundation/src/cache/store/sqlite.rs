//! SQLite durable cache store
//!
//! ```sql
//! api_cache(query_hash TEXT PRIMARY KEY, response_data TEXT, api_type TEXT,
//!           created_at TEXT, expires_at TEXT)
//! ```
//!
//! Timestamps are RFC 3339 with fixed precision, so expiry comparisons can be
//! done directly in SQL.

use super::{format_timestamp, parse_timestamp, CacheEntry, CacheStore, StoredPayload};
use crate::cache::fingerprint::CacheKey;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Durable cache store backed by a single SQLite connection
///
/// The connection sits behind a mutex, so each upsert is atomic per key and
/// concurrent callers are serialized. Last writer wins.
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create cache directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // WAL for concurrent readers across processes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;

        info!(path = %path.display(), "Opened durable cache");
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS api_cache (
                query_hash TEXT PRIMARY KEY,
                response_data TEXT NOT NULL,
                api_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_api_cache_expires
                ON api_cache(expires_at);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Number of rows, expired or not
    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM api_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl CacheStore for SqliteCacheStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        let conn = self.lock()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT response_data, expires_at FROM api_cache
                 WHERE query_hash = ?1 AND expires_at > ?2",
                params![key.as_str(), format_timestamp(now)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((payload, expires_at)) => Ok(Some(StoredPayload {
                payload,
                expires_at: parse_timestamp(&expires_at)?,
            })),
            None => Ok(None),
        }
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO api_cache (query_hash, response_data, api_type, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(query_hash) DO UPDATE SET
                response_data = excluded.response_data,
                api_type = excluded.api_type,
                expires_at = excluded.expires_at
            "#,
            params![
                entry.key.as_str(),
                entry.payload,
                entry.request_class,
                format_timestamp(entry.created_at),
                format_timestamp(entry.expires_at),
            ],
        )?;

        debug!(key = %entry.key, request_class = %entry.request_class, "Upserted durable cache entry");
        Ok(())
    }

    fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM api_cache WHERE expires_at <= ?1",
            params![format_timestamp(now)],
        )?;
        Ok(removed)
    }
}
