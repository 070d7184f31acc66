//! Two-bar candlestick pattern detectors
//!
//! Engulfing and Harami. Both compare real bodies of the previous and current
//! candle; Engulfing needs the current body to strictly contain the previous
//! one, Harami the reverse.

use super::helpers::{
    body_strictly_contains, cap_confidence, is_eligible, prior_direction, range_contains,
    trailing_avg_volume, CONFIDENCE_BASE, DEFAULT_MIN_RANGE, MIN_RANGE_PARAM, VOLUME_LOOKBACK,
};
use super::PatternDetector;
use crate::{
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    Direction, EngineError, OHLCVExt, PatternId, PatternMatch, Result, OHLCV,
};

impl_with_defaults!(EngulfingDetector, HaramiDetector);

const TREND_CONTEXT: usize = 3;

/// Candles have opposite colors (a doji counts as neither)
#[inline]
fn opposite_colors<A: OHLCV, B: OHLCV>(a: &A, b: &B) -> bool {
    (a.is_bullish() && b.is_bearish()) || (a.is_bearish() && b.is_bullish())
}

/// Current volume exceeds both the previous candle and the trailing average
fn volume_expands<T: OHLCV>(bars: &[T], index: usize) -> bool {
    let (Some(prev), Some(curr)) = (index.checked_sub(1).and_then(|i| bars.get(i)), bars.get(index)) else {
        return false;
    };
    let above_avg = trailing_avg_volume(bars, index, VOLUME_LOOKBACK).is_some_and(|avg| curr.volume() > avg);
    curr.volume() > prev.volume() && above_avg
}

// ============================================================
// ENGULFING
// ============================================================

/// Engulfing - current body strictly contains the previous body
///
/// Direction follows the color of the engulfing candle.
#[derive(Debug, Clone, Copy)]
pub struct EngulfingDetector {
    /// Current body must be at least this multiple of the previous body
    pub min_body_ratio: f64,
    pub require_opposite_colors: bool,
    pub min_range: f64,
}

impl Default for EngulfingDetector {
    fn default() -> Self {
        Self {
            min_body_ratio: 1.0,
            require_opposite_colors: true,
            min_range: DEFAULT_MIN_RANGE,
        }
    }
}

impl PatternDetector for EngulfingDetector {
    fn id(&self) -> PatternId {
        PatternId("ENGULFING")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let prev = bars.get(index.checked_sub(1)?)?;
        let curr = bars.get(index)?;
        if !is_eligible(prev, self.min_range) || !is_eligible(curr, self.min_range) {
            return None;
        }
        if self.require_opposite_colors && !opposite_colors(prev, curr) {
            return None;
        }
        if !body_strictly_contains(curr, prev) || curr.body() < self.min_body_ratio * prev.body() {
            return None;
        }

        let direction = if curr.is_bullish() {
            Direction::Bullish
        } else if curr.is_bearish() {
            Direction::Bearish
        } else {
            return None;
        };

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction,
            start_index: index - 1,
            end_index: index,
            variant: None,
        })
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        let m = self.detect_at(bars, index)?;
        let prev = &bars[index - 1];
        let curr = &bars[index];

        let mut confidence = CONFIDENCE_BASE;
        if prev.body() > 0.0 && curr.body() / prev.body() >= 1.5 {
            confidence += 0.1;
        }
        if range_contains(curr, prev) {
            confidence += 0.1;
        }
        if volume_expands(bars, index) {
            confidence += 0.1;
        }
        // engulfing against the prior move
        let against = match m.direction {
            Direction::Bullish => Direction::Bearish,
            _ => Direction::Bullish,
        };
        if index >= 1 && prior_direction(bars, index - 1, TREND_CONTEXT) == Some(against) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_body_ratio < 1.0 {
            return Err(EngineError::InvalidValue("min_body_ratio must be >= 1"));
        }
        Ok(())
    }
}

// ============================================================
// HARAMI
// ============================================================

/// Harami - previous body strictly contains a small current body
///
/// Direction opposes the color of the previous candle: a bearish mother bar
/// gives a bullish harami.
#[derive(Debug, Clone, Copy)]
pub struct HaramiDetector {
    /// Current body must be at most this multiple of the previous body
    pub max_body_ratio: f64,
    pub require_opposite_colors: bool,
    pub min_range: f64,
}

impl Default for HaramiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: 0.5,
            require_opposite_colors: false,
            min_range: DEFAULT_MIN_RANGE,
        }
    }
}

impl PatternDetector for HaramiDetector {
    fn id(&self) -> PatternId {
        PatternId("HARAMI")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let prev = bars.get(index.checked_sub(1)?)?;
        let curr = bars.get(index)?;
        if !is_eligible(prev, self.min_range) || !is_eligible(curr, self.min_range) {
            return None;
        }
        if self.require_opposite_colors && !opposite_colors(prev, curr) {
            return None;
        }
        if !body_strictly_contains(prev, curr) || curr.body() > self.max_body_ratio * prev.body() {
            return None;
        }

        let direction = if prev.is_bearish() {
            Direction::Bullish
        } else if prev.is_bullish() {
            Direction::Bearish
        } else {
            return None;
        };

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction,
            start_index: index - 1,
            end_index: index,
            variant: None,
        })
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        let m = self.detect_at(bars, index)?;
        let prev = &bars[index - 1];
        let curr = &bars[index];

        let mut confidence = CONFIDENCE_BASE;
        // tiny inside body
        if prev.body() > 0.0 && curr.body() / prev.body() <= 0.25 {
            confidence += 0.1;
        }
        if range_contains(prev, curr) {
            confidence += 0.1;
        }
        if opposite_colors(prev, curr) {
            confidence += 0.05;
        }
        let against = match m.direction {
            Direction::Bullish => Direction::Bearish,
            _ => Direction::Bullish,
        };
        if prior_direction(bars, index - 1, TREND_CONTEXT) == Some(against) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        if self.max_body_ratio <= 0.0 || self.max_body_ratio >= 1.0 {
            return Err(EngineError::OutOfRange {
                field: "max_body_ratio",
                value: self.max_body_ratio,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

const MIN_BODY_RATIO: ParamMeta = ParamMeta::number(
    "min_body_ratio",
    1.0,
    (1.0, 10.0, 0.1),
    "Engulfing body as a multiple of the engulfed body",
);
const MAX_BODY_RATIO: ParamMeta = ParamMeta::ratio(
    "max_body_ratio",
    0.5,
    (0.05, 0.95, 0.05),
    "Inside body as a share of the mother body",
);
const ENGULFING_OPPOSITE: ParamMeta =
    ParamMeta::flag("require_opposite_colors", true, "Candles must have opposite colors");
const HARAMI_OPPOSITE: ParamMeta =
    ParamMeta::flag("require_opposite_colors", false, "Candles must have opposite colors");

static ENGULFING_PARAMS: &[ParamMeta] = &[MIN_BODY_RATIO, ENGULFING_OPPOSITE, MIN_RANGE_PARAM];
static HARAMI_PARAMS: &[ParamMeta] = &[MAX_BODY_RATIO, HARAMI_OPPOSITE, MIN_RANGE_PARAM];

impl ParameterizedAlgorithm for EngulfingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        ENGULFING_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            min_body_ratio: params.number(&MIN_BODY_RATIO)?,
            require_opposite_colors: params.flag(&ENGULFING_OPPOSITE)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "engulfing"
    }
}

impl ParameterizedAlgorithm for HaramiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HARAMI_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            max_body_ratio: params.number(&MAX_BODY_RATIO)?,
            require_opposite_colors: params.flag(&HARAMI_OPPOSITE)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "harami"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct C(f64, f64, f64, f64, f64);

    impl OHLCV for C {
        fn open(&self) -> f64 {
            self.0
        }
        fn high(&self) -> f64 {
            self.1
        }
        fn low(&self) -> f64 {
            self.2
        }
        fn close(&self) -> f64 {
            self.3
        }
        fn volume(&self) -> f64 {
            self.4
        }
    }

    fn c(o: f64, h: f64, l: f64, cl: f64) -> C {
        C(o, h, l, cl, 1000.0)
    }

    #[test]
    fn test_bullish_engulfing() {
        let bars = [c(101.0, 101.5, 99.5, 100.0), c(99.5, 102.5, 99.0, 102.0)];
        let m = EngulfingDetector::with_defaults().detect_at(&bars, 1).unwrap();
        assert_eq!(m.direction, Direction::Bullish);
        assert_eq!((m.start_index, m.end_index), (0, 1));
    }

    #[test]
    fn test_bearish_engulfing() {
        let bars = [c(100.0, 101.5, 99.5, 101.0), c(101.5, 102.0, 98.5, 99.0)];
        let m = EngulfingDetector::with_defaults().detect_at(&bars, 1).unwrap();
        assert_eq!(m.direction, Direction::Bearish);
    }

    #[test]
    fn test_engulfing_requires_strict_containment() {
        // bodies share the top edge
        let bars = [c(101.0, 101.5, 99.5, 100.0), c(99.5, 101.5, 99.0, 101.0)];
        assert!(EngulfingDetector::with_defaults().detect_at(&bars, 1).is_none());
    }

    #[test]
    fn test_engulfing_same_color_toggle() {
        let bars = [c(100.0, 101.2, 99.8, 101.0), c(99.5, 102.5, 99.0, 102.0)];
        assert!(EngulfingDetector::with_defaults().detect_at(&bars, 1).is_none());
        let relaxed = EngulfingDetector {
            require_opposite_colors: false,
            ..EngulfingDetector::default()
        };
        assert!(relaxed.detect_at(&bars, 1).is_some());
    }

    #[test]
    fn test_engulfing_never_fires_on_first_bar() {
        let bars = [c(101.0, 101.5, 99.5, 100.0), c(99.5, 102.5, 99.0, 102.0)];
        assert_eq!(EngulfingDetector::with_defaults().detect(&bars), vec![false, true]);
    }

    #[test]
    fn test_harami_direction_opposes_mother_bar() {
        let bars = [c(105.0, 105.5, 99.5, 100.0), c(102.0, 103.0, 101.5, 102.5)];
        let m = HaramiDetector::with_defaults().detect_at(&bars, 1).unwrap();
        assert_eq!(m.direction, Direction::Bullish);

        let bars = [c(100.0, 105.5, 99.5, 105.0), c(102.5, 103.0, 101.5, 102.0)];
        let m = HaramiDetector::with_defaults().detect_at(&bars, 1).unwrap();
        assert_eq!(m.direction, Direction::Bearish);
    }

    #[test]
    fn test_harami_rejects_large_inner_body() {
        // inner body 3 of mother body 5
        let bars = [c(105.0, 105.5, 99.5, 100.0), c(101.0, 104.5, 100.5, 104.0)];
        assert!(HaramiDetector::with_defaults().detect_at(&bars, 1).is_none());
    }

    #[test]
    fn test_engulfing_confidence() {
        let mut bars: Vec<C> = (0..4).map(|i| c(110.0 - i as f64, 110.5 - i as f64, 108.5 - i as f64, 109.0 - i as f64)).collect();
        bars.push(c(106.0, 106.2, 104.8, 105.0));
        bars.push(C(104.5, 107.5, 104.0, 107.0, 5000.0));
        let d = EngulfingDetector::with_defaults();
        assert!(d.detect_at(&bars, 5).is_some());
        let conf = d.confidence_at(&bars, 5).unwrap();
        // base + body ratio + range + volume + prior decline
        assert!((conf - 1.0).abs() < 1e-9);
        assert!(d.confidence_at(&bars, 3).is_none());
    }

    #[test]
    fn test_with_params() {
        let params = ParamSet::new().with("require_opposite_colors", false);
        assert!(!EngulfingDetector::with_params(&params).unwrap().require_opposite_colors);
        let params = ParamSet::new().with("max_body_ratio", 0.3);
        assert_eq!(HaramiDetector::with_params(&params).unwrap().max_body_ratio, 0.3);
        let params = ParamSet::new().with("min_body_ratio", 0.5);
        assert!(EngulfingDetector::with_params(&params).is_err());
    }
}
