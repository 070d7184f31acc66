//! Common helper functions for candlestick pattern detection
//!
//! Thresholds and trailing statistics shared across all detector modules.

use crate::{params::ParamMeta, Direction, OHLCVExt, OHLCV};

// ============================================================
// THRESHOLDS
// ============================================================

/// Candles with a smaller high-low range are never eligible
pub const DEFAULT_MIN_RANGE: f64 = 1e-8;

/// Doji: body/range below this ratio
pub const DOJI_RATIO: f64 = 0.1;
/// Doji subtypes: a shadow below this share of the range counts as absent
pub const DOJI_SHADOW_ABSENT_RATIO: f64 = 0.1;
/// Doji subtypes: both shadows at least this share of the range is long-legged
pub const DOJI_LONG_LEG_RATIO: f64 = 0.4;

/// Hammer family: long shadow >= body * SHADOW_BODY_MULTIPLE
pub const SHADOW_BODY_MULTIPLE: f64 = 2.0;
/// Hammer family: long shadow >= range * LONG_SHADOW_RATIO
pub const LONG_SHADOW_RATIO: f64 = 0.6;
/// Hammer family: opposite shadow < range * SHORT_SHADOW_RATIO
pub const SHORT_SHADOW_RATIO: f64 = 0.1;

/// Star patterns: first candle body/range at least this ratio
pub const STAR_FIRST_BODY_RATIO: f64 = 0.5;
/// Star patterns: star body at most this multiple of the first body
pub const STAR_BODY_MULTIPLE: f64 = 0.3;

/// Bars averaged for volume confirmation
pub const VOLUME_LOOKBACK: usize = 10;

/// Parameter shared by every detector
pub const MIN_RANGE_PARAM: ParamMeta = ParamMeta::number(
    "min_range",
    DEFAULT_MIN_RANGE,
    (0.0, 1.0e6, 1.0e-8),
    "Candles with a smaller high-low range are ignored",
);

// ============================================================
// CONFIDENCE
// ============================================================

/// Starting confidence of every firing
pub const CONFIDENCE_BASE: f64 = 0.6;

/// Clamp a confidence score into [0, 1]
#[inline]
pub fn cap_confidence(confidence: f64) -> f64 {
    confidence.clamp(0.0, 1.0)
}

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Range at least `min_range` (guards every ratio against division by zero)
#[inline]
pub fn is_eligible<T: OHLCV>(bar: &T, min_range: f64) -> bool {
    let range = bar.range();
    range > 0.0 && range >= min_range
}

/// Mean close of the `lookback` bars strictly before `at`.
///
/// Returns `None` when fewer than `lookback` bars precede `at`.
#[inline]
pub fn trailing_mean_close<T: OHLCV>(bars: &[T], at: usize, lookback: usize) -> Option<f64> {
    if lookback == 0 || at < lookback {
        return None;
    }
    let slice = &bars[at - lookback..at];
    Some(slice.iter().map(|b| b.close()).sum::<f64>() / lookback as f64)
}

/// Mean volume of up to `period` bars strictly before `at`
#[inline]
pub fn trailing_avg_volume<T: OHLCV>(bars: &[T], at: usize, period: usize) -> Option<f64> {
    if at == 0 || period == 0 {
        return None;
    }
    let s = at.saturating_sub(period);
    let slice = &bars[s..at];
    Some(slice.iter().map(|b| b.volume()).sum::<f64>() / slice.len() as f64)
}

/// Volume at `at` exceeds the trailing average volume
#[inline]
pub fn volume_confirms<T: OHLCV>(bars: &[T], at: usize) -> bool {
    match (bars.get(at), trailing_avg_volume(bars, at, VOLUME_LOOKBACK)) {
        (Some(bar), Some(avg)) => avg > 0.0 && bar.volume() > avg,
        _ => false,
    }
}

/// Close-to-close direction over the `lookback` bars before `at`
pub fn prior_direction<T: OHLCV>(bars: &[T], at: usize, lookback: usize) -> Option<Direction> {
    if lookback < 2 || at < lookback {
        return None;
    }
    let first = bars[at - lookback].close();
    let last = bars[at - 1].close();
    Some(if last > first {
        Direction::Bullish
    } else if last < first {
        Direction::Bearish
    } else {
        Direction::Neutral
    })
}

/// `outer` body strictly contains `inner` body on both ends
#[inline]
pub fn body_strictly_contains<A: OHLCV, B: OHLCV>(outer: &A, inner: &B) -> bool {
    outer.body_top() > inner.body_top() && outer.body_bottom() < inner.body_bottom()
}

/// `outer` high/low range fully covers `inner`
#[inline]
pub fn range_contains<A: OHLCV, B: OHLCV>(outer: &A, inner: &B) -> bool {
    outer.high() >= inner.high() && outer.low() <= inner.low()
}
