//! Cache entries and write modes.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tally_core::DEFAULT_CACHE_TTL_SECS;

/// How a write combines with an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Replace,
    Append,
}

/// Per-write parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub merge_mode: MergeMode,
    /// `None` uses the store's default TTL.
    pub ttl: Option<Duration>,
    /// Field used to de-duplicate appended records.
    pub unique_by: Option<String>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::replace()
    }
}

impl WriteOptions {
    pub fn replace() -> Self {
        Self {
            merge_mode: MergeMode::Replace,
            ttl: None,
            unique_by: None,
        }
    }

    pub fn append(unique_by: Option<&str>) -> Self {
        Self {
            merge_mode: MergeMode::Append,
            ttl: None,
            unique_by: unique_by.map(str::to_string),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A stored value with its insertion time and lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub inserted_at: DateTime<Utc>,
    pub ttl: Duration,
    pub merge_mode: MergeMode,
    pub unique_by: Option<String>,
}

impl CacheEntry {
    pub fn new(value: Value, inserted_at: DateTime<Utc>) -> Self {
        Self {
            value,
            inserted_at,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            merge_mode: MergeMode::Replace,
            unique_by: None,
        }
    }

    /// `None` when the TTL is too large to represent; such entries never expire.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.inserted_at.checked_add_signed(ttl))
    }

    /// Expired once `inserted_at + ttl < now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => expires_at < now,
            None => false,
        }
    }

    /// Age of the entry relative to `now`, zero if `now` precedes insertion.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.inserted_at).to_std().unwrap_or(Duration::ZERO)
    }
}
