//! Time-to-first-sale heuristic.
//!
//! Maps a 0-10 launch potential score to an estimated number of days before
//! a new Etsy listing makes its first sale. Piecewise linear over fixed
//! breakpoints:
//!
//! | score      | expected days              |
//! |------------|----------------------------|
//! | 0 ..= 3    | 20                         |
//! | 4 ..= 7    | 10                         |
//! | 8 ..= 10   | 5 at 8 down to 1 at 10     |
//!
//! Fractional scores between bands interpolate between the neighbouring band
//! values.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const LOW_BAND_DAYS: f64 = 20.0;
const MID_BAND_DAYS: f64 = 10.0;
const HIGH_BAND_START_DAYS: f64 = 5.0;
const HIGH_BAND_END_DAYS: f64 = 1.0;
const SPREAD: f64 = 0.3;
const ADS_MULTIPLIER: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FirstSaleEstimate {
    pub min_days: i32,
    pub max_days: i32,
    pub expected_days: i32,
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Expected days before the first sale, unrounded.
pub fn expected_days(score: f64) -> f64 {
    let s = if score.is_finite() {
        score.clamp(0.0, 10.0)
    } else {
        0.0
    };

    if s <= 3.0 {
        LOW_BAND_DAYS
    } else if s < 4.0 {
        lerp(LOW_BAND_DAYS, MID_BAND_DAYS, s - 3.0)
    } else if s <= 7.0 {
        MID_BAND_DAYS
    } else if s < 8.0 {
        lerp(MID_BAND_DAYS, HIGH_BAND_START_DAYS, s - 7.0)
    } else {
        lerp(HIGH_BAND_START_DAYS, HIGH_BAND_END_DAYS, (s - 8.0) / 2.0)
    }
}

pub fn estimate_time_to_first_sale(score: f64) -> FirstSaleEstimate {
    let expected = expected_days(score);
    let expected_days = (expected.round() as i32).max(1);
    let min_days = ((expected * (1.0 - SPREAD)).round() as i32).clamp(1, expected_days);
    let max_days = ((expected * (1.0 + SPREAD)).round() as i32).max(expected_days);

    FirstSaleEstimate {
        min_days,
        max_days,
        expected_days,
    }
}

/// Same estimate assuming paid ads are running. Never slower than the
/// organic estimate and never below one day.
pub fn estimate_time_to_first_sale_with_ads(score: f64) -> FirstSaleEstimate {
    let organic = estimate_time_to_first_sale(score);
    let scale = |days: i32| ((days as f64 * ADS_MULTIPLIER).round() as i32).clamp(1, days.max(1));

    let expected_days = scale(organic.expected_days);
    FirstSaleEstimate {
        min_days: scale(organic.min_days).min(expected_days),
        max_days: scale(organic.max_days).max(expected_days),
        expected_days,
    }
}
