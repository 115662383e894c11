//! Cache usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of reads that returned a live entry.
    pub hits: u64,
    /// Number of reads that found nothing or an expired entry.
    pub misses: u64,
    /// Entries evicted because their TTL had passed.
    pub expirations: u64,
    /// Entries evicted by an explicit invalidation or clear.
    pub invalidations: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self, n: u64) {
        self.expirations.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn invalidated(&self, n: u64) {
        self.invalidations.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entry_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let counters = Counters::default();
        counters.hit();
        counters.hit();
        counters.hit();
        counters.miss();
        let stats = counters.snapshot(2);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.entry_count, 2);
    }
}
