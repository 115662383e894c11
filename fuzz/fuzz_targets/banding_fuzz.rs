//! Fuzz test for score banding
//!
//! Run with: cargo +nightly fuzz run banding_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_hygiene::{banded_score, ScoreRecord, BANDS};

fuzz_target!(|data: (u64, u64, f64)| {
    let (matched, total, weight) = data;

    let percent = tally_hygiene::percent_of(matched, total);
    assert!(BANDS.contains(&banded_score(percent)));
    assert!(BANDS.contains(&banded_score(f64::from_bits(matched))));

    if !(weight.is_finite() && weight > 0.0 && weight <= 1_000.0) {
        return;
    }
    let record = ScoreRecord::compute("fuzz", None, weight, matched, total);
    if total == 0 {
        assert_eq!(record.score, 0);
        assert_eq!(record.score_percent, 0);
    } else {
        assert!(f64::from(record.score) <= weight.round());
    }
});
