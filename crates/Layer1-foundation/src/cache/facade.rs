//! Response cache façade
//!
//! Lookup order: durable store, then fallback store. Writes go to the durable
//! store and degrade to the fallback store only when the durable write fails;
//! the two are not mirrored.
//!
//! Every store error stops here. Callers see a miss (read) or nothing at all
//! (write), never an error.

use super::fingerprint::{fingerprint, CacheKey};
use super::stats::{CacheStats, StatsCounters};
use super::store::{CacheEntry, CacheStore, FileCacheStore, SqliteCacheStore, UnavailableStore};
use crate::config::CacheSettings;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on TTLs, keeps expiry timestamps in four-digit years
const MAX_TTL_DAYS: i64 = 36_500;

/// Result of a physical sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub durable_removed: usize,
    pub fallback_removed: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.durable_removed + self.fallback_removed
    }
}

/// Two-tier response cache
pub struct ResponseCache {
    durable: Arc<dyn CacheStore>,
    fallback: Arc<dyn CacheStore>,
    promote_fallback_hits: bool,
    stats: StatsCounters,
}

impl ResponseCache {
    pub fn new(durable: Arc<dyn CacheStore>, fallback: Arc<dyn CacheStore>) -> Self {
        Self {
            durable,
            fallback,
            promote_fallback_hits: true,
            stats: StatsCounters::default(),
        }
    }

    /// Copy fallback hits into the durable store when it answers a clean miss
    pub fn with_promotion(mut self, enabled: bool) -> Self {
        self.promote_fallback_hits = enabled;
        self
    }

    /// Build from settings
    ///
    /// A durable store that cannot be opened is replaced by [`UnavailableStore`],
    /// so the cache keeps working on the fallback store alone.
    pub fn open(settings: &CacheSettings) -> Self {
        let db_path = settings.database_path();
        let durable: Arc<dyn CacheStore> = match SqliteCacheStore::open(&db_path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(path = %db_path.display(), error = %e, "Durable cache unavailable, using fallback store only");
                Arc::new(UnavailableStore::new(e.to_string()))
            }
        };
        let fallback = Arc::new(FileCacheStore::new(settings.fallback_path()));

        Self::new(durable, fallback).with_promotion(settings.promote_fallback_hits())
    }

    /// Look up a live payload for `(request_class, request)`
    pub fn get<T: Serialize + ?Sized>(&self, request_class: &str, request: &T) -> Option<Value> {
        let key = match fingerprint(request_class, request) {
            Ok(key) => key,
            Err(e) => {
                warn!(request_class, error = %e, "Cannot fingerprint request, bypassing cache");
                StatsCounters::bump(&self.stats.errors);
                return None;
            }
        };
        self.get_by_key(request_class, &key, Utc::now())
    }

    /// Typed variant of [`get`](Self::get); a payload of the wrong shape is a miss
    pub fn get_as<R, T>(&self, request_class: &str, request: &T) -> Option<R>
    where
        R: DeserializeOwned,
        T: Serialize + ?Sized,
    {
        let value = self.get(request_class, request)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(request_class, error = %e, "Cached payload has unexpected shape");
                None
            }
        }
    }

    fn get_by_key(&self, request_class: &str, key: &CacheKey, now: DateTime<Utc>) -> Option<Value> {
        let durable_clean_miss = match self.durable.get(key, now) {
            Ok(Some(hit)) => {
                if let Some(value) = self.decode(key, &hit.payload) {
                    StatsCounters::bump(&self.stats.durable_hits);
                    debug!(key = %key, request_class, store = self.durable.name(), "Cache hit");
                    return Some(value);
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(key = %key, store = self.durable.name(), error = %e, "Durable cache read failed");
                StatsCounters::bump(&self.stats.errors);
                false
            }
        };

        match self.fallback.get(key, now) {
            Ok(Some(hit)) => {
                if let Some(value) = self.decode(key, &hit.payload) {
                    StatsCounters::bump(&self.stats.fallback_hits);
                    debug!(key = %key, request_class, store = self.fallback.name(), "Cache hit");

                    if self.promote_fallback_hits && durable_clean_miss {
                        self.promote(key, request_class, hit.payload, hit.expires_at, now);
                    }
                    return Some(value);
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, store = self.fallback.name(), error = %e, "Fallback cache read failed");
                StatsCounters::bump(&self.stats.errors);
            }
        }

        StatsCounters::bump(&self.stats.misses);
        None
    }

    fn decode(&self, key: &CacheKey, payload: &str) -> Option<Value> {
        match serde_json::from_str(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload is not valid JSON, treating as absent");
                StatsCounters::bump(&self.stats.errors);
                None
            }
        }
    }

    fn promote(
        &self,
        key: &CacheKey,
        request_class: &str,
        payload: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            request_class: request_class.to_string(),
            created_at: now,
            expires_at,
        };
        match self.durable.upsert(&entry) {
            Ok(()) => {
                StatsCounters::bump(&self.stats.promotions);
                debug!(key = %key, "Promoted fallback entry to durable store");
            }
            Err(e) => debug!(key = %key, error = %e, "Promotion skipped"),
        }
    }

    /// Store `payload` for `(request_class, request)` for `ttl`
    pub fn put<T, P>(&self, request_class: &str, request: &T, payload: &P, ttl: Duration)
    where
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let key = match fingerprint(request_class, request) {
            Ok(key) => key,
            Err(e) => {
                warn!(request_class, error = %e, "Cannot fingerprint request, not caching");
                StatsCounters::bump(&self.stats.errors);
                return;
            }
        };
        let payload = match serde_json::to_string(payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(key = %key, error = %e, "Cannot serialize payload, not caching");
                StatsCounters::bump(&self.stats.errors);
                return;
            }
        };

        let now = Utc::now();
        let entry = CacheEntry {
            key,
            payload,
            request_class: request_class.to_string(),
            created_at: now,
            expires_at: now + clamp_ttl(ttl),
        };
        self.put_entry(&entry);
    }

    fn put_entry(&self, entry: &CacheEntry) {
        let durable_err = match self.durable.upsert(entry) {
            Ok(()) => {
                StatsCounters::bump(&self.stats.writes);
                return;
            }
            Err(e) => e,
        };

        warn!(
            key = %entry.key,
            store = self.durable.name(),
            error = %durable_err,
            "Durable cache write failed, writing to fallback store"
        );
        StatsCounters::bump(&self.stats.errors);

        match self.fallback.upsert(entry) {
            Ok(()) => StatsCounters::bump(&self.stats.fallback_writes),
            Err(e) => {
                warn!(key = %entry.key, store = self.fallback.name(), error = %e, "Fallback cache write failed");
                StatsCounters::bump(&self.stats.errors);
            }
        }
    }

    /// Physically delete expired entries from both stores (best-effort)
    pub fn sweep(&self) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();

        match self.durable.sweep(now) {
            Ok(n) => report.durable_removed = n,
            Err(e) => warn!(store = self.durable.name(), error = %e, "Sweep failed"),
        }
        match self.fallback.sweep(now) {
            Ok(n) => report.fallback_removed = n,
            Err(e) => warn!(store = self.fallback.name(), error = %e, "Sweep failed"),
        }

        debug!(
            durable = report.durable_removed,
            fallback = report.fallback_removed,
            "Swept expired cache entries"
        );
        report
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

fn clamp_ttl(ttl: Duration) -> chrono::Duration {
    let max = chrono::Duration::days(MAX_TTL_DAYS);
    chrono::Duration::from_std(ttl).map_or(max, |d| d.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::StoredPayload;
    use crate::{Error, Result};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Durable store that can be switched into an outage
    struct FlakyStore {
        inner: SqliteCacheStore,
        down: AtomicBool,
        upserts: AtomicUsize,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: SqliteCacheStore::in_memory().unwrap(),
                down: AtomicBool::new(false),
                upserts: AtomicUsize::new(0),
            }
        }

        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(Error::Storage("database is locked".into()));
            }
            Ok(())
        }
    }

    impl CacheStore for FlakyStore {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<Option<StoredPayload>> {
            self.check()?;
            self.inner.get(key, now)
        }

        fn upsert(&self, entry: &CacheEntry) -> Result<()> {
            self.check()?;
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert(entry)
        }

        fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
            self.check()?;
            self.inner.sweep(now)
        }
    }

    fn setup() -> (TempDir, Arc<FlakyStore>, Arc<FileCacheStore>, ResponseCache) {
        let dir = TempDir::new().unwrap();
        let durable = Arc::new(FlakyStore::new());
        let fallback = Arc::new(FileCacheStore::new(dir.path().join("cache")));
        let cache = ResponseCache::new(durable.clone(), fallback.clone());
        (dir, durable, fallback, cache)
    }

    #[test]
    fn test_put_then_get() {
        let (_dir, _durable, _fallback, cache) = setup();
        let request = json!({"prompt": "3 days in Porto", "model": "m"});

        cache.put("chat", &request, "Day 1: Ribeira", Duration::from_secs(3600));
        assert_eq!(cache.get("chat", &request), Some(json!("Day 1: Ribeira")));
        assert_eq!(cache.stats().durable_hits, 1);
    }

    #[test]
    fn test_get_as_typed() {
        let (_dir, _durable, _fallback, cache) = setup();
        let request = json!({"geocode": "Kyoto"});

        cache.put("geocode", &request, &json!({"lat": 35.0, "lng": 135.7}), Duration::from_secs(60));

        let coords: Option<std::collections::BTreeMap<String, f64>> = cache.get_as("geocode", &request);
        assert_eq!(coords.unwrap()["lat"], 35.0);

        let wrong: Option<Vec<String>> = cache.get_as("geocode", &request);
        assert!(wrong.is_none());
    }

    #[test]
    fn test_request_class_isolation() {
        let (_dir, _durable, _fallback, cache) = setup();
        let request = json!({"location": "Oslo"});

        cache.put("geocode", &request, "coords", Duration::from_secs(60));
        assert!(cache.get("location_data", &request).is_none());
    }

    #[test]
    fn test_zero_ttl_expires() {
        let (_dir, _durable, _fallback, cache) = setup();
        let request = json!({"q": "expire me"});

        cache.put("chat", &request, "gone", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("chat", &request).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_fallback_survives_durable_outage() {
        let (_dir, durable, _fallback, cache) = setup();
        let request = json!({"q": "outage"});
        durable.set_down(true);

        cache.put("chat", &request, "still cached", Duration::from_secs(60));
        assert_eq!(cache.get("chat", &request), Some(json!("still cached")));

        let stats = cache.stats();
        assert_eq!(stats.fallback_writes, 1);
        assert_eq!(stats.fallback_hits, 1);
        assert_eq!(stats.promotions, 0);
    }

    #[test]
    fn test_no_mirroring_on_healthy_write() {
        let (_dir, _durable, fallback, cache) = setup();
        let request = json!({"q": "healthy"});

        cache.put("chat", &request, "durable only", Duration::from_secs(60));

        let key = fingerprint("chat", &request).unwrap();
        assert!(fallback.get(&key, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_fallback_hit_promoted_after_recovery() {
        let (_dir, durable, _fallback, cache) = setup();
        let request = json!({"q": "promote"});

        durable.set_down(true);
        cache.put("chat", &request, "v", Duration::from_secs(60));
        durable.set_down(false);

        assert_eq!(cache.get("chat", &request), Some(json!("v")));
        assert_eq!(cache.stats().promotions, 1);

        // Second read comes from the durable store
        assert_eq!(cache.get("chat", &request), Some(json!("v")));
        assert_eq!(cache.stats().durable_hits, 1);
    }

    #[test]
    fn test_promotion_disabled() {
        let dir = TempDir::new().unwrap();
        let durable = Arc::new(FlakyStore::new());
        let fallback = Arc::new(FileCacheStore::new(dir.path()));
        let cache = ResponseCache::new(durable.clone(), fallback).with_promotion(false);
        let request = json!({"q": "stay"});

        durable.set_down(true);
        cache.put("chat", &request, "v", Duration::from_secs(60));
        durable.set_down(false);

        assert!(cache.get("chat", &request).is_some());
        assert_eq!(durable.upserts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_corrupt_durable_payload_is_miss() {
        let (_dir, durable, _fallback, cache) = setup();
        let request = json!({"q": "corrupt"});
        let now = Utc::now();
        durable
            .upsert(&CacheEntry {
                key: fingerprint("chat", &request).unwrap(),
                payload: "{truncated".into(),
                request_class: "chat".into(),
                created_at: now,
                expires_at: now + chrono::Duration::hours(1),
            })
            .unwrap();

        assert!(cache.get("chat", &request).is_none());
        assert!(cache.stats().errors >= 1);
    }

    #[test]
    fn test_both_stores_down_never_errors() {
        let durable: Arc<dyn CacheStore> = Arc::new(UnavailableStore::new("disk gone"));
        let fallback: Arc<dyn CacheStore> = Arc::new(UnavailableStore::new("disk gone"));
        let cache = ResponseCache::new(durable, fallback);
        let request = json!({"q": "nothing works"});

        cache.put("chat", &request, "lost", Duration::from_secs(60));
        assert!(cache.get("chat", &request).is_none());
        assert_eq!(cache.sweep(), SweepReport::default());
    }

    #[test]
    fn test_sweep_reports_both_stores() {
        let (_dir, durable, _fallback, cache) = setup();

        cache.put("chat", &json!({"q": 1}), "a", Duration::ZERO);
        durable.set_down(true);
        cache.put("chat", &json!({"q": 2}), "b", Duration::ZERO);
        durable.set_down(false);
        std::thread::sleep(Duration::from_millis(5));

        let report = cache.sweep();
        assert_eq!(report.durable_removed, 1);
        assert_eq!(report.fallback_removed, 1);
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_open_with_unwritable_db_path_degrades() {
        let dir = TempDir::new().unwrap();
        // A regular file where the data directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let settings = CacheSettings {
            data_dir: Some(blocker.join("data")),
            ..Default::default()
        };
        let cache = ResponseCache::open(&settings);
        let request = json!({"q": "degraded"});

        // Both stores live under the blocked path, so nothing sticks, but nothing panics
        cache.put("chat", &request, "x", Duration::from_secs(60));
        assert!(cache.get("chat", &request).is_none());
    }

    #[test]
    fn test_clamp_ttl() {
        assert_eq!(clamp_ttl(Duration::from_secs(60)), chrono::Duration::seconds(60));
        assert_eq!(clamp_ttl(Duration::MAX), chrono::Duration::days(MAX_TTL_DAYS));
    }
}
