//! The TTL cache store.

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, MergeMode, WriteOptions};
use crate::merge::{append_merge, dedup_collection};
use crate::stats::{CacheStats, Counters};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{CacheKey, ResourceName, TallyConfig, DEFAULT_CACHE_TTL_SECS};

/// Process-wide store of remote results keyed by `(resource, method, request_id)`.
///
/// Expiry is lazy: an expired entry is evicted by the read that finds it.
/// Nothing sweeps in the background; [`CacheStore::purge_expired`] exists
/// for callers that want to reclaim memory explicitly.
#[derive(Debug)]
pub struct CacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    counters: Counters,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            default_ttl,
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &TallyConfig) -> Self {
        Self::new(config.cache_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the live entry for `key`, evicting it first if it has expired.
    pub fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now();

        match self.entries.get(key) {
            None => {
                self.counters.miss();
                return None;
            }
            Some(entry) if !entry.is_expired(now) => {
                self.counters.hit();
                return Some(entry.clone());
            }
            Some(_) => {}
        }

        // Re-check under the shard lock; a concurrent write may have refreshed it.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.counters.expired(1);
            tracing::debug!(key = %key, "Evicted expired cache entry");
        }
        self.counters.miss();
        None
    }

    /// Store `value` under `key` and return what is now stored.
    ///
    /// In append mode the value is concatenated onto a live existing
    /// collection. If the shapes cannot be appended, the write replaces.
    pub fn write(&self, key: CacheKey, value: Value, options: &WriteOptions) -> CacheEntry {
        let now = self.clock.now();
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let unique_by = options.unique_by.as_deref();

        match (options.merge_mode, self.entries.entry(key)) {
            (MergeMode::Append, Entry::Occupied(mut occupied))
                if !occupied.get().is_expired(now) =>
            {
                let merged = match append_merge(&occupied.get().value, value.clone(), unique_by) {
                    Some(merged) => merged,
                    None => {
                        tracing::warn!(
                            key = %occupied.key(),
                            "Append target is not a compatible collection, replacing"
                        );
                        dedup_collection(value, unique_by)
                    }
                };
                let entry = build_entry(merged, now, ttl, options);
                occupied.insert(entry.clone());
                entry
            }
            (MergeMode::Append, slot) => {
                let entry = build_entry(dedup_collection(value, unique_by), now, ttl, options);
                insert_into(slot, entry.clone());
                entry
            }
            (MergeMode::Replace, slot) => {
                let entry = build_entry(value, now, ttl, options);
                insert_into(slot, entry.clone());
                entry
            }
        }
    }

    /// Forced eviction, independent of TTL. Returns whether an entry was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.counters.invalidated(1);
            tracing::debug!(key = %key, "Invalidated cache entry");
        }
        removed
    }

    /// Evict every entry belonging to `resource`.
    pub fn invalidate_resource(&self, resource: &ResourceName) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.resource != resource);
        let removed = before.saturating_sub(self.entries.len());
        self.counters.invalidated(removed as u64);
        tracing::debug!(resource = %resource, removed, "Invalidated resource entries");
        removed
    }

    /// Evict everything.
    pub fn clear(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.counters.invalidated(removed as u64);
        removed
    }

    /// Evict all expired entries now.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        self.counters.expired(removed as u64);
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len() as u64)
    }
}

fn build_entry(
    value: Value,
    now: chrono::DateTime<chrono::Utc>,
    ttl: Duration,
    options: &WriteOptions,
) -> CacheEntry {
    CacheEntry {
        value,
        inserted_at: now,
        ttl,
        merge_mode: options.merge_mode,
        unique_by: options.unique_by.clone(),
    }
}

fn insert_into(slot: Entry<'_, CacheKey, CacheEntry>, entry: CacheEntry) {
    match slot {
        Entry::Occupied(mut occupied) => {
            occupied.insert(entry);
        }
        Entry::Vacant(vacant) => {
            vacant.insert(entry);
        }
    }
}
