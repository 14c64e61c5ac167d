//! # Wayfarer Response Cache
//!
//! Makes repeated calls to the remote text-generation service cheap to repeat.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     ResponseCache                          │
//! │   get(class, request) / put(class, request, payload, ttl)  │
//! │                          │                                 │
//! │               fingerprint(class, request)                  │
//! │                 SHA-256 over canonical JSON                │
//! │                          │                                 │
//! │          ┌───────────────┴────────────────┐                │
//! │          ▼                                ▼                │
//! │   SqliteCacheStore                  FileCacheStore         │
//! │   (durable, primary)        (fallback, one file per key)   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wayfarer_foundation::cache::ResponseCache;
//! use wayfarer_foundation::CacheSettings;
//! use std::time::Duration;
//!
//! let cache = ResponseCache::open(&CacheSettings::default());
//!
//! let request = serde_json::json!({"geocode": "Lisbon"});
//! if cache.get("geocode", &request).is_none() {
//!     cache.put("geocode", &request, &coords, Duration::from_secs(30 * 86_400));
//! }
//! ```

pub mod facade;
pub mod fingerprint;
pub mod stats;
pub mod store;

pub use facade::{ResponseCache, SweepReport};
pub use fingerprint::{canonical_json, fingerprint, fingerprint_value, CacheKey, CACHE_KEY_LEN};
pub use stats::CacheStats;
pub use store::{
    CacheEntry, CacheStore, FileCacheStore, SqliteCacheStore, StoredPayload, UnavailableStore,
};
