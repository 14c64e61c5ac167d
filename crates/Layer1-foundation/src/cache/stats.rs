//! Cache statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of façade counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Hits served by the durable store
    pub durable_hits: u64,
    /// Hits served by the fallback store
    pub fallback_hits: u64,
    /// Lookups that found nothing live
    pub misses: u64,
    /// Successful durable writes
    pub writes: u64,
    /// Writes that degraded to the fallback store
    pub fallback_writes: u64,
    /// Fallback hits copied back into the durable store
    pub promotions: u64,
    /// Swallowed store / payload errors
    pub errors: u64,
}

impl CacheStats {
    /// Calculate overall hit rate
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.durable_hits + self.fallback_hits;
        let total = hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}

/// Lock-free counters shared by concurrent callers
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub durable_hits: AtomicU64,
    pub fallback_hits: AtomicU64,
    pub misses: AtomicU64,
    pub writes: AtomicU64,
    pub fallback_writes: AtomicU64,
    pub promotions: AtomicU64,
    pub errors: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            fallback_hits: self.fallback_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            fallback_writes: self.fallback_writes.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
