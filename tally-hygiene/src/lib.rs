//! Tally Hygiene - Weighted Score Engine
//!
//! Scores how "clean" a set of tickets is. Each hygiene category counts
//! problem tickets; the share of problem tickets is banded onto a fixed
//! curve ([`banded_score`]) and weighted. A [`HygieneEngine`] fetches the
//! total and every active category in one coordinator join and produces
//! either a [`Scorecard`] or a [`HygieneTrend`] of per-period buckets.
//!
//! Categories whose weight is not positive are never requested.

pub mod band;
pub mod category;
pub mod engine;
pub mod interval;
pub mod profile;
pub mod score;
pub mod weights;

pub use band::{banded_score, percent_of, weighted_score, BANDS};
pub use category::{
    builtin_categories, custom_from_configs, HygieneCategory, ISSUE_CATEGORIES, SUPPORT_CATEGORIES,
};
pub use engine::{trigger_key, EnginePhase, HygieneEngine, HygieneRequest};
pub use interval::{TrendInterval, WeekLabel};
pub use profile::{ReportProfile, ReportShape, OU_FIELDS};
pub use score::{HygieneTrend, ScoreRecord, Scorecard, TrendBucket};
pub use weights::WeightMap;
