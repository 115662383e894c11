//! Tally Labels - ID Resolution Batcher
//!
//! Turns sets of entity ids, grouped by type, into display labels. Ids
//! already present in a previous label map are never looked up again; the
//! rest go out as one list request per type through a single coordinator
//! join. Resolved labels accumulate in a per-form [`FormLabelCache`].

pub mod batcher;
pub mod entry;
pub mod form_cache;
pub mod lookup;

pub use batcher::{is_placeholder, IdBatcher, Resolution};
pub use entry::{IdLabelEntry, LabelMap};
pub use form_cache::FormLabelCache;
pub use lookup::LabelLookup;
