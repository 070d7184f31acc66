//! Single-bar candlestick pattern detectors
//!
//! Doji, Hammer, Shooting Star, and Hanging Man. Hammer and Hanging Man share
//! their geometry; Hanging Man additionally requires the close to sit above the
//! mean close of the preceding bars.

use super::helpers::{
    self, cap_confidence, is_eligible, prior_direction, trailing_mean_close, volume_confirms,
    CONFIDENCE_BASE, MIN_RANGE_PARAM,
};
use super::PatternDetector;
use crate::{
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    Direction, EngineError, OHLCVExt, PatternId, PatternMatch, Period, Ratio, Result, OHLCV,
};

impl_with_defaults!(DojiDetector, HammerDetector, ShootingStarDetector, HangingManDetector);

/// Bars inspected for trend context in confidence scoring
const TREND_CONTEXT: usize = 3;

// ============================================================
// SHARED GEOMETRY
// ============================================================

/// Long-shadow geometry shared by the Hammer family
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowGeometry {
    /// Long shadow >= body * multiple
    pub shadow_body_multiple: f64,
    /// Long shadow >= range * ratio
    pub long_shadow_ratio: Ratio,
    /// Opposite shadow < range * ratio
    pub short_shadow_ratio: Ratio,
}

impl Default for ShadowGeometry {
    fn default() -> Self {
        Self {
            shadow_body_multiple: helpers::SHADOW_BODY_MULTIPLE,
            long_shadow_ratio: Ratio::new_const(helpers::LONG_SHADOW_RATIO),
            short_shadow_ratio: Ratio::new_const(helpers::SHORT_SHADOW_RATIO),
        }
    }
}

impl ShadowGeometry {
    fn matches(&self, long: f64, short: f64, body: f64, range: f64) -> bool {
        long >= self.shadow_body_multiple * body
            && long >= self.long_shadow_ratio.get() * range
            && short < self.short_shadow_ratio.get() * range
    }

    /// Long lower shadow, small body near the top
    pub fn is_hammer<T: OHLCV>(&self, bar: &T) -> bool {
        self.matches(bar.lower_shadow(), bar.upper_shadow(), bar.body(), bar.range())
    }

    /// Long upper shadow, small body near the bottom
    pub fn is_inverted<T: OHLCV>(&self, bar: &T) -> bool {
        self.matches(bar.upper_shadow(), bar.lower_shadow(), bar.body(), bar.range())
    }

    fn validate(&self) -> Result<()> {
        if self.shadow_body_multiple < 1.0 {
            return Err(EngineError::InvalidValue("shadow_body_multiple must be >= 1"));
        }
        if self.short_shadow_ratio >= self.long_shadow_ratio {
            return Err(EngineError::InvalidValue("short_shadow_ratio must be < long_shadow_ratio"));
        }
        Ok(())
    }

    fn from_params(params: &ParamSet) -> Result<Self> {
        Ok(Self {
            shadow_body_multiple: params.number(&SHADOW_BODY_MULTIPLE)?,
            long_shadow_ratio: params.ratio(&LONG_SHADOW_RATIO)?,
            short_shadow_ratio: params.ratio(&SHORT_SHADOW_RATIO)?,
        })
    }
}

/// Shadow-to-body bonus: +0.1 when the long shadow is at least 3x the body
#[inline]
fn shadow_bonus(long: f64, body: f64) -> f64 {
    if long >= 3.0 * body {
        0.1
    } else {
        0.0
    }
}

// ============================================================
// DOJI
// ============================================================

/// Doji - open and close nearly equal
///
/// Fires when `body / range < max_body_ratio`. The match variant names the
/// subtype: `dragonfly` (no upper shadow), `gravestone` (no lower shadow),
/// `long_legged` (both shadows long) or `standard`.
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    pub max_body_ratio: Ratio,
    pub min_range: f64,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: Ratio::new_const(helpers::DOJI_RATIO),
            min_range: helpers::DEFAULT_MIN_RANGE,
        }
    }
}

impl DojiDetector {
    /// Subtype of an eligible doji candle
    pub fn subtype<T: OHLCV>(bar: &T) -> &'static str {
        let (Some(upper), Some(lower)) = (bar.upper_shadow_ratio(), bar.lower_shadow_ratio()) else {
            return "standard";
        };
        if upper >= helpers::DOJI_LONG_LEG_RATIO && lower >= helpers::DOJI_LONG_LEG_RATIO {
            "long_legged"
        } else if upper < helpers::DOJI_SHADOW_ABSENT_RATIO {
            "dragonfly"
        } else if lower < helpers::DOJI_SHADOW_ABSENT_RATIO {
            "gravestone"
        } else {
            "standard"
        }
    }
}

impl PatternDetector for DojiDetector {
    fn id(&self) -> PatternId {
        PatternId("DOJI")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_eligible(bar, self.min_range) {
            return None;
        }
        if bar.body() / bar.range() >= self.max_body_ratio.get() {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Neutral,
            start_index: index,
            end_index: index,
            variant: Some(Self::subtype(bar)),
        })
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        let bar = bars.get(index)?;
        let body_ratio = bar.body_ratio()?;

        let mut confidence = CONFIDENCE_BASE;
        // near-perfect doji
        if body_ratio < self.max_body_ratio.get() / 2.0 {
            confidence += 0.1;
        }
        if Self::subtype(bar) != "standard" {
            confidence += 0.05;
        }
        // indecision after a directional run
        if matches!(
            prior_direction(bars, index, TREND_CONTEXT),
            Some(Direction::Bullish | Direction::Bearish)
        ) {
            confidence += 0.1;
        }
        if volume_confirms(bars, index) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        if self.max_body_ratio.get() <= 0.0 {
            return Err(EngineError::InvalidValue("max_body_ratio must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// HAMMER / SHOOTING STAR
// ============================================================

/// Hammer - small body near the top, long lower shadow
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    pub geometry: ShadowGeometry,
    pub min_range: f64,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            geometry: ShadowGeometry::default(),
            min_range: helpers::DEFAULT_MIN_RANGE,
        }
    }
}

impl PatternDetector for HammerDetector {
    fn id(&self) -> PatternId {
        PatternId("HAMMER")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_eligible(bar, self.min_range) || !self.geometry.is_hammer(bar) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            start_index: index,
            end_index: index,
            variant: None,
        })
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        let bar = bars.get(index)?;
        let mut confidence = CONFIDENCE_BASE + shadow_bonus(bar.lower_shadow(), bar.body());
        // reversal after a decline
        if prior_direction(bars, index, TREND_CONTEXT) == Some(Direction::Bearish) {
            confidence += 0.15;
        }
        if bar.is_bullish() {
            confidence += 0.05;
        }
        if volume_confirms(bars, index) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        self.geometry.validate()
    }
}

/// Shooting Star - small body near the bottom, long upper shadow
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarDetector {
    pub geometry: ShadowGeometry,
    pub min_range: f64,
}

impl Default for ShootingStarDetector {
    fn default() -> Self {
        Self {
            geometry: ShadowGeometry::default(),
            min_range: helpers::DEFAULT_MIN_RANGE,
        }
    }
}

impl PatternDetector for ShootingStarDetector {
    fn id(&self) -> PatternId {
        PatternId("SHOOTING_STAR")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_eligible(bar, self.min_range) || !self.geometry.is_inverted(bar) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bearish,
            start_index: index,
            end_index: index,
            variant: None,
        })
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        let bar = bars.get(index)?;
        let mut confidence = CONFIDENCE_BASE + shadow_bonus(bar.upper_shadow(), bar.body());
        // reversal after an advance
        if prior_direction(bars, index, TREND_CONTEXT) == Some(Direction::Bullish) {
            confidence += 0.15;
        }
        if bar.is_bearish() {
            confidence += 0.05;
        }
        if volume_confirms(bars, index) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        self.geometry.validate()
    }
}

// ============================================================
// HANGING MAN
// ============================================================

/// Hanging Man - Hammer geometry at the top of an advance
///
/// The close must exceed the mean close of the preceding `lookback` bars, so
/// the first `lookback` bars are never eligible.
#[derive(Debug, Clone, Copy)]
pub struct HangingManDetector {
    pub geometry: ShadowGeometry,
    pub lookback: Period,
    pub min_range: f64,
}

impl Default for HangingManDetector {
    fn default() -> Self {
        Self {
            geometry: ShadowGeometry::default(),
            lookback: Period::new_const(3),
            min_range: helpers::DEFAULT_MIN_RANGE,
        }
    }
}

impl PatternDetector for HangingManDetector {
    fn id(&self) -> PatternId {
        PatternId("HANGING_MAN")
    }

    fn min_bars(&self) -> usize {
        1 + self.lookback.get()
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if !is_eligible(bar, self.min_range) || !self.geometry.is_hammer(bar) {
            return None;
        }
        let mean = trailing_mean_close(bars, index, self.lookback.get())?;
        if bar.close() <= mean {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bearish,
            start_index: index - self.lookback.get(),
            end_index: index,
            variant: None,
        })
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        let bar = bars.get(index)?;
        let mean = trailing_mean_close(bars, index, self.lookback.get())?;

        let mut confidence = CONFIDENCE_BASE + shadow_bonus(bar.lower_shadow(), bar.body());
        // strength of the advance into the candle
        if mean > 0.0 && (bar.close() - mean) / mean > 0.02 {
            confidence += 0.1;
        }
        if bar.is_bearish() {
            confidence += 0.05;
        }
        if volume_confirms(bars, index) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        self.geometry.validate()
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

const MAX_BODY_RATIO: ParamMeta =
    ParamMeta::ratio("max_body_ratio", 0.1, (0.01, 0.5, 0.01), "Body/range below which a candle is a doji");
const SHADOW_BODY_MULTIPLE: ParamMeta =
    ParamMeta::number("shadow_body_multiple", 2.0, (1.0, 10.0, 0.5), "Long shadow as a multiple of the body");
const LONG_SHADOW_RATIO: ParamMeta =
    ParamMeta::ratio("long_shadow_ratio", 0.6, (0.3, 0.95, 0.05), "Long shadow share of the range");
const SHORT_SHADOW_RATIO: ParamMeta =
    ParamMeta::ratio("short_shadow_ratio", 0.1, (0.0, 0.3, 0.05), "Opposite shadow share of the range");
const LOOKBACK: ParamMeta =
    ParamMeta::period("lookback", 3.0, (1.0, 50.0, 1.0), "Prior closes averaged for the trend gate");

static DOJI_PARAMS: &[ParamMeta] = &[MAX_BODY_RATIO, MIN_RANGE_PARAM];
static HAMMER_PARAMS: &[ParamMeta] = &[
    SHADOW_BODY_MULTIPLE,
    LONG_SHADOW_RATIO,
    SHORT_SHADOW_RATIO,
    MIN_RANGE_PARAM,
];
static HANGING_MAN_PARAMS: &[ParamMeta] = &[
    SHADOW_BODY_MULTIPLE,
    LONG_SHADOW_RATIO,
    SHORT_SHADOW_RATIO,
    LOOKBACK,
    MIN_RANGE_PARAM,
];

impl ParameterizedAlgorithm for DojiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOJI_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            max_body_ratio: params.ratio(&MAX_BODY_RATIO)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "doji"
    }
}

impl ParameterizedAlgorithm for HammerDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            geometry: ShadowGeometry::from_params(params)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "hammer"
    }
}

impl ParameterizedAlgorithm for ShootingStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            geometry: ShadowGeometry::from_params(params)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "shooting_star"
    }
}

impl ParameterizedAlgorithm for HangingManDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HANGING_MAN_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            geometry: ShadowGeometry::from_params(params)?,
            lookback: params.period(&LOOKBACK)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "hanging_man"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Bar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
        v: f64,
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.o
        }
        fn high(&self) -> f64 {
            self.h
        }
        fn low(&self) -> f64 {
            self.l
        }
        fn close(&self) -> f64 {
            self.c
        }
        fn volume(&self) -> f64 {
            self.v
        }
    }

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { o, h, l, c, v: 1000.0 }
    }

    #[test]
    fn test_doji_reference_bar() {
        let d = DojiDetector::with_defaults();
        assert!(d.detect_at(&[bar(100.0, 102.0, 98.0, 100.05)], 0).is_some());
        assert!(d.detect_at(&[bar(100.0, 102.0, 98.0, 110.0)], 0).is_none());
    }

    #[test]
    fn test_doji_subtypes() {
        let d = DojiDetector::with_defaults();
        let variant = |b: Bar| d.detect_at(&[b], 0).and_then(|m| m.variant);
        assert_eq!(variant(bar(100.0, 102.0, 98.0, 100.05)), Some("long_legged"));
        assert_eq!(variant(bar(100.0, 100.05, 96.0, 100.0)), Some("dragonfly"));
        assert_eq!(variant(bar(100.0, 104.0, 99.95, 100.0)), Some("gravestone"));
        assert_eq!(variant(bar(100.0, 101.0, 97.0, 100.1)), Some("standard"));
    }

    #[test]
    fn test_zero_range_never_eligible() {
        let flat = [bar(100.0, 100.0, 100.0, 100.0)];
        assert!(DojiDetector::with_defaults().detect_at(&flat, 0).is_none());
        assert!(HammerDetector::with_defaults().detect_at(&flat, 0).is_none());
        assert!(ShootingStarDetector::with_defaults().detect_at(&flat, 0).is_none());
    }

    #[test]
    fn test_hammer_geometry() {
        let h = HammerDetector::with_defaults();
        // body 1, lower 7, upper 0.5, range 8.5
        assert!(h.detect_at(&[bar(99.0, 100.5, 92.0, 100.0)], 0).is_some());
        // upper shadow too long
        assert!(h.detect_at(&[bar(99.0, 102.0, 92.0, 100.0)], 0).is_none());
        // lower shadow below 60% of range
        assert!(h.detect_at(&[bar(97.0, 100.1, 95.0, 100.0)], 0).is_none());
    }

    #[test]
    fn test_shooting_star_mirrors_hammer() {
        let s = ShootingStarDetector::with_defaults();
        let m = s.detect_at(&[bar(101.0, 108.0, 99.5, 100.0)], 0).unwrap();
        assert_eq!(m.direction, Direction::Bearish);
        assert!(s.detect_at(&[bar(99.0, 100.5, 92.0, 100.0)], 0).is_none());
    }

    #[test]
    fn test_hanging_man_needs_uptrend() {
        let hm = HangingManDetector::with_defaults();
        let hammer = bar(109.0, 110.5, 102.0, 110.0);
        let up = vec![
            bar(100.0, 101.0, 99.0, 100.0),
            bar(101.0, 102.0, 100.0, 101.0),
            bar(102.0, 103.0, 101.0, 102.0),
            hammer.clone(),
        ];
        let m = hm.detect_at(&up, 3).unwrap();
        assert_eq!(m.direction, Direction::Bearish);
        assert_eq!(m.start_index, 0);

        let down = vec![
            bar(120.0, 121.0, 119.0, 120.0),
            bar(118.0, 119.0, 117.0, 118.0),
            bar(116.0, 117.0, 115.0, 116.0),
            hammer,
        ];
        assert!(hm.detect_at(&down, 3).is_none());
        assert!(HammerDetector::with_defaults().detect_at(&down, 3).is_some());
    }

    #[test]
    fn test_hanging_man_first_bars_ineligible() {
        let hm = HangingManDetector::with_defaults();
        assert_eq!(hm.min_bars(), 4);
        let bars = vec![bar(99.0, 100.5, 92.0, 100.0); 3];
        assert_eq!(hm.detect(&bars), vec![false; 3]);
    }

    #[test]
    fn test_confidence_bounds_and_bonuses() {
        let h = HammerDetector::with_defaults();
        let mut bars = vec![
            bar(110.0, 111.0, 109.0, 110.0),
            bar(108.0, 109.0, 107.0, 108.0),
            bar(106.0, 107.0, 105.0, 106.0),
        ];
        let mut hammer = bar(99.0, 100.5, 92.0, 100.0);
        hammer.v = 5000.0;
        bars.push(hammer);
        let c = h.confidence_at(&bars, 3).unwrap();
        // base + shadow + downtrend + bullish + volume, capped
        assert!((c - 1.0).abs() < 1e-9);
        let alone = h.confidence_at(&[bar(100.0, 100.5, 92.0, 99.0)], 0).unwrap();
        assert!((alone - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_with_params_validates() {
        let params = ParamSet::new().with("long_shadow_ratio", 0.2);
        assert!(HammerDetector::with_params(&params).is_err());
        let params = ParamSet::new().with("lookback", 5.0);
        assert_eq!(HangingManDetector::with_params(&params).unwrap().min_bars(), 6);
        let params = ParamSet::new().with("max_body_ratio", 0.05);
        assert!(DojiDetector::with_params(&params).is_ok());
    }

    #[test]
    fn test_defaults_match_empty_params() {
        let empty = ParamSet::new();
        assert_eq!(HammerDetector::with_defaults().min_range, helpers::DEFAULT_MIN_RANGE);
        assert_eq!(
            HammerDetector::with_defaults().min_range,
            HammerDetector::with_params(&empty).unwrap().min_range
        );
        assert_eq!(
            ShootingStarDetector::with_defaults().min_range,
            ShootingStarDetector::with_params(&empty).unwrap().min_range
        );
        assert_eq!(
            DojiDetector::with_defaults().min_range,
            DojiDetector::with_params(&empty).unwrap().min_range
        );
        assert_eq!(
            HangingManDetector::with_defaults().min_range,
            HangingManDetector::with_params(&empty).unwrap().min_range
        );
    }
}
