//! Constants for the tally orchestration core
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// CACHE
// ============================================================================

/// Default time-to-live for cached remote results in seconds (1 hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

// ============================================================================
// SCORING
// ============================================================================

/// Weight applied to a category when the caller's weight map omits it.
pub const DEFAULT_CATEGORY_WEIGHT: f64 = 12.5;

// ============================================================================
// DISPATCH
// ============================================================================

/// Prefix of the default completion signal name.
pub const COMPLETION_SIGNAL_PREFIX: &str = "COMPLETE";

/// Request timeout of zero in the environment means "no timeout".
pub const TIMEOUT_DISABLED_MS: u64 = 0;

/// Substrings that mark an id as a template placeholder rather than a real id.
pub const PLACEHOLDER_ID_MARKERS: &[&str] = &["custom|", "${"];
