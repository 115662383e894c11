//! Percentage to score banding.
//!
//! The curve is fixed and non-linear. Each band's upper edge is inclusive:
//!
//! | percent      | band |
//! |--------------|------|
//! | exactly 0    | 100  |
//! | (0, 11]      | 75   |
//! | (11, 21]     | 55   |
//! | (21, 31]     | 30   |
//! | (31, 41]     | 10   |
//! | above 41     | 5    |

/// Every value [`banded_score`] can return.
pub const BANDS: [u8; 6] = [100, 75, 55, 30, 10, 5];

/// Band for a percentage of matching tickets.
///
/// Anything that is not a finite percentage in one of the lower bands
/// (including NaN) lands in the bottom band.
pub fn banded_score(percent: f64) -> u8 {
    if percent == 0.0 {
        100
    } else if percent > 0.0 && percent <= 11.0 {
        75
    } else if percent > 11.0 && percent <= 21.0 {
        55
    } else if percent > 21.0 && percent <= 31.0 {
        30
    } else if percent > 31.0 && percent <= 41.0 {
        10
    } else {
        5
    }
}

/// `matched / total * 100`, or 0 when there is nothing to divide by.
pub fn percent_of(matched: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matched as f64 / total as f64 * 100.0
}

/// Unrounded weighted score: `band * weight / 100`, 0 for an empty total.
pub fn weighted_score(matched: u64, total: u64, weight: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(banded_score(percent_of(matched, total))) * weight / 100.0
}
