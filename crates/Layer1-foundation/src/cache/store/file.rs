//! File-per-key fallback cache store
//!
//! 각 캐시 키마다 `<dir>/<key>.json` 파일 하나:
//!
//! ```json
//! {"response": <payload>, "expires_at": "2026-01-01T00:00:00.000000Z"}
//! ```
//!
//! 쓰기는 `.<key>.<uuid>.tmp`에 먼저 쓰고 rename 한다. 파일명이 캐시 키가
//! 아닌 파일은 건드리지 않는다.

use super::{format_timestamp, parse_timestamp, CacheEntry, CacheStore, StoredPayload};
use crate::cache::fingerprint::CacheKey;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "tmp";

/// Temp files younger than this may still belong to a write in progress
const TMP_GRACE_SECS: i64 = 60;

/// What a directory entry is, judged by its name
#[derive(Debug, PartialEq, Eq)]
enum FileKind {
    Record,
    Temp,
    Foreign,
}

/// On-disk record layout
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    response: Value,
    expires_at: String,
}

/// Fallback store writing one JSON file per cache key
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of record files, live or not
    pub fn len(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for dir_entry in std::fs::read_dir(&self.dir)? {
            if Self::kind_of(&dir_entry?.path()) == FileKind::Record {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, EXTENSION))
    }

    fn tmp_path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.{}", key, uuid::Uuid::new_v4(), TMP_EXTENSION))
    }

    fn kind_of(path: &Path) -> FileKind {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return FileKind::Foreign;
        };

        if let Some(stem) = name.strip_suffix(&format!(".{}", EXTENSION)) {
            if CacheKey::from_hex(stem).is_some() {
                return FileKind::Record;
            }
        } else if let Some(rest) = name
            .strip_prefix('.')
            .and_then(|n| n.strip_suffix(&format!(".{}", TMP_EXTENSION)))
        {
            let key = rest.split('.').next().unwrap_or_default();
            if CacheKey::from_hex(key).is_some() {
                return FileKind::Temp;
            }
        }
        FileKind::Foreign
    }

    /// Temp file left behind by a writer that died before its rename
    fn is_abandoned(path: &Path, now: DateTime<Utc>) -> bool {
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => {
                now - DateTime::<Utc>::from(modified) >= chrono::Duration::seconds(TMP_GRACE_SECS)
            }
            Err(_) => false,
        }
    }

    fn read_record(path: &Path) -> Result<FileRecord> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::CorruptRecord(format!("{}: {}", path.display(), e)))
    }

    /// Best-effort removal of an unreadable record
    fn discard(path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "Could not discard corrupt cache file");
        }
    }
}

impl CacheStore for FileCacheStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let record = match Self::read_record(&path) {
            Ok(record) => record,
            Err(Error::CorruptRecord(msg)) => {
                warn!(key = %key, "Discarding corrupt fallback cache file: {}", msg);
                Self::discard(&path);
                return Ok(None);
            }
            // Vanished between exists() and read: a concurrent sweep
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let expires_at = match parse_timestamp(&record.expires_at) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding fallback cache file with bad expiry");
                Self::discard(&path);
                return Ok(None);
            }
        };

        if now >= expires_at {
            return Ok(None);
        }

        Ok(Some(StoredPayload {
            payload: record.response.to_string(),
            expires_at,
        }))
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let response: Value = serde_json::from_str(&entry.payload)?;
        let record = FileRecord {
            response,
            expires_at: format_timestamp(entry.expires_at),
        };
        let content = serde_json::to_vec(&record)?;

        // Write-then-rename keeps readers from seeing a half written file
        let tmp = self.tmp_path_for(&entry.key);
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, self.path_for(&entry.key)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(key = %entry.key, "Wrote fallback cache file");
        Ok(())
    }

    fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut orphans = 0;
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            match Self::kind_of(&path) {
                FileKind::Record => {}
                FileKind::Temp => {
                    if Self::is_abandoned(&path, now) && std::fs::remove_file(&path).is_ok() {
                        orphans += 1;
                    }
                    continue;
                }
                FileKind::Foreign => continue,
            }

            let stale = match Self::read_record(&path) {
                Ok(record) => match parse_timestamp(&record.expires_at) {
                    Ok(expires_at) => now >= expires_at,
                    Err(_) => true,
                },
                Err(Error::CorruptRecord(_)) => true,
                Err(_) => false,
            };

            if stale && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if orphans > 0 {
            debug!(dir = %self.dir.display(), orphans, "Removed abandoned temp files");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint::fingerprint_value;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(payload: Value, ttl: Duration) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: fingerprint_value("places_nearby", &payload),
            payload: payload.to_string(),
            request_class: "places_nearby".to_string(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[test]
    fn test_upsert_then_get() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path().join("cache"));
        let e = entry(json!({"results": ["Alfama"]}), Duration::hours(1));

        store.upsert(&e).unwrap();
        let hit = store.get(&e.key, Utc::now()).unwrap().unwrap();
        let value: Value = serde_json::from_str(&hit.payload).unwrap();
        assert_eq!(value, json!({"results": ["Alfama"]}));
    }

    #[test]
    fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        let e = entry(json!("text"), Duration::hours(1));
        store.upsert(&e).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(format!("{}.json", e.key))).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["response"], json!("text"));
        assert!(value["expires_at"].is_string());
    }

    #[test]
    fn test_missing_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        let key = fingerprint_value("chat", &json!("nothing"));
        assert!(store.get(&key, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_expired_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        let e = entry(json!("stale"), Duration::zero());
        store.upsert(&e).unwrap();

        assert!(store
            .get(&e.key, e.expires_at + Duration::milliseconds(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_corrupt_file_is_absent_and_discarded() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        let key = fingerprint_value("chat", &json!("corrupt"));
        let path = dir.path().join(format!("{}.json", key));
        std::fs::write(&path, "{not json").unwrap();

        assert!(store.get(&key, Utc::now()).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_sweep_removes_expired_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        let fresh = entry(json!("fresh"), Duration::hours(1));
        let stale = entry(json!("stale"), Duration::zero());
        store.upsert(&fresh).unwrap();
        store.upsert(&stale).unwrap();
        let corrupt = fingerprint_value("chat", &json!("corrupt"));
        std::fs::write(dir.path().join(format!("{}.json", corrupt)), "][").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        std::fs::write(dir.path().join("settings.json"), "][").unwrap();

        let removed = store.sweep(Utc::now() + Duration::seconds(1)).unwrap();
        assert_eq!(removed, 2);
        assert!(store.get(&fresh.key, Utc::now()).unwrap().is_some());
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("settings.json").exists());
    }

    #[test]
    fn test_sweep_removes_abandoned_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        let e = entry(json!({"city": "Oaxaca"}), Duration::hours(1));
        store.upsert(&e).unwrap();

        let orphan = store.tmp_path_for(&e.key);
        std::fs::write(&orphan, "{\"response\":").unwrap();
        let foreign = dir.path().join(".editor.swp.tmp");
        std::fs::write(&foreign, "x").unwrap();

        // A fresh temp file may be a write in progress
        assert_eq!(store.sweep(Utc::now()).unwrap(), 0);
        assert!(orphan.exists());

        let removed = store.sweep(Utc::now() + Duration::minutes(5)).unwrap();
        assert_eq!(removed, 0);
        assert!(!orphan.exists());
        assert!(foreign.exists());
        assert!(store.get(&e.key, Utc::now()).unwrap().is_some());
    }

    #[test]
    fn test_kind_of() {
        let key = fingerprint_value("chat", &json!("x"));
        let dir = Path::new("/cache");

        assert_eq!(
            FileCacheStore::kind_of(&dir.join(format!("{}.json", key))),
            FileKind::Record
        );
        assert_eq!(
            FileCacheStore::kind_of(&dir.join(format!(".{}.abc.tmp", key))),
            FileKind::Temp
        );
        assert_eq!(
            FileCacheStore::kind_of(&dir.join("config.json")),
            FileKind::Foreign
        );
        assert_eq!(
            FileCacheStore::kind_of(&dir.join(format!("{}.txt", key))),
            FileKind::Foreign
        );
    }

    #[test]
    fn test_sweep_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path().join("never-created"));
        assert_eq!(store.sweep(Utc::now()).unwrap(), 0);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_len_counts_records_only() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path());
        store
            .upsert(&entry(json!({"city": "Quito"}), Duration::hours(1)))
            .unwrap();
        store
            .upsert(&entry(json!({"city": "Lima"}), Duration::hours(1)))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("other.json"), "{}").unwrap();

        assert_eq!(store.len().unwrap(), 2);
    }
}
