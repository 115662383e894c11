//! Tally Cache - TTL Cache Store
//!
//! Holds remote-call results keyed by `(resource, method, request_id)`.
//! Entries carry their own TTL and are evicted lazily by the read that
//! finds them expired. Writes either replace or append, with optional
//! de-duplication of appended records by a key field.
//!
//! The store never performs I/O. Time comes from an injected [`Clock`] so
//! expiry can be driven by [`ManualClock`] in tests.

pub mod clock;
pub mod entry;
pub mod merge;
pub mod stats;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, MergeMode, WriteOptions};
pub use merge::{append_merge, dedup_records};
pub use stats::CacheStats;
pub use store::CacheStore;
