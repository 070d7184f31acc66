//! Three-bar candlestick pattern detectors: Morning Star and Evening Star.
//!
//! Both share one shape: a long first candle, a small star, and a third candle
//! of the opposite color that closes beyond the midpoint of the first body.

use super::helpers::{
    self, cap_confidence, is_eligible, volume_confirms, CONFIDENCE_BASE, MIN_RANGE_PARAM,
};
use super::PatternDetector;
use crate::{
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    Direction, EngineError, OHLCVExt, PatternId, PatternMatch, Ratio, Result, OHLCV,
};

impl_with_defaults!(MorningStarDetector, EveningStarDetector);

/// Star geometry shared by both detectors
#[derive(Debug, Clone, Copy)]
pub struct StarGeometry {
    /// First candle body/range at least this ratio
    pub first_body_ratio: Ratio,
    /// Star body at most this multiple of the first body
    pub star_body_multiple: f64,
    pub min_range: f64,
}

impl Default for StarGeometry {
    fn default() -> Self {
        Self {
            first_body_ratio: Ratio::new_const(helpers::STAR_FIRST_BODY_RATIO),
            star_body_multiple: helpers::STAR_BODY_MULTIPLE,
            min_range: helpers::DEFAULT_MIN_RANGE,
        }
    }
}

impl StarGeometry {
    /// Check the three candles ending at `index`; `direction` is the reversal
    /// direction (Bullish for Morning Star).
    fn matches<T: OHLCV>(&self, bars: &[T], index: usize, direction: Direction) -> bool {
        let Some(start) = index.checked_sub(2) else {
            return false;
        };
        let (Some(first), Some(star), Some(third)) = (bars.get(start), bars.get(start + 1), bars.get(index))
        else {
            return false;
        };
        if ![first, star, third].iter().all(|b| is_eligible(*b, self.min_range)) {
            return false;
        }
        if first.body_ratio().map_or(true, |r| r < self.first_body_ratio.get()) {
            return false;
        }
        if star.body() > self.star_body_multiple * first.body() {
            return false;
        }

        let midpoint = first.body_midpoint();
        match direction {
            Direction::Bullish => first.is_bearish() && third.is_bullish() && third.close() >= midpoint,
            Direction::Bearish => first.is_bullish() && third.is_bearish() && third.close() <= midpoint,
            Direction::Neutral => false,
        }
    }

    fn confidence<T: OHLCV>(&self, bars: &[T], index: usize, direction: Direction) -> Option<f64> {
        if !self.matches(bars, index, direction) {
            return None;
        }
        let (first, star, third) = (&bars[index - 2], &bars[index - 1], &bars[index]);

        let mut confidence = CONFIDENCE_BASE;
        let (gapped, full_recovery) = match direction {
            Direction::Bullish => (star.body_top() < first.body_bottom(), third.close() > first.open()),
            _ => (star.body_bottom() > first.body_top(), third.close() < first.open()),
        };
        if gapped {
            confidence += 0.1;
        }
        if full_recovery {
            confidence += 0.1;
        }
        // doji star
        if star.body_ratio().is_some_and(|r| r < helpers::DOJI_RATIO) {
            confidence += 0.05;
        }
        if volume_confirms(bars, index) {
            confidence += 0.1;
        }
        Some(cap_confidence(confidence))
    }

    fn validate(&self) -> Result<()> {
        if self.star_body_multiple <= 0.0 || self.star_body_multiple >= 1.0 {
            return Err(EngineError::OutOfRange {
                field: "star_body_multiple",
                value: self.star_body_multiple,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }

    fn from_params(params: &ParamSet) -> Result<Self> {
        Ok(Self {
            first_body_ratio: params.ratio(&FIRST_BODY_RATIO)?,
            star_body_multiple: params.number(&STAR_BODY_MULTIPLE)?,
            min_range: params.number(&MIN_RANGE_PARAM)?,
        })
    }
}

fn star_match(id: PatternId, direction: Direction, index: usize) -> PatternMatch {
    PatternMatch {
        pattern_id: id,
        direction,
        start_index: index - 2,
        end_index: index,
        variant: None,
    }
}

// ============================================================
// MORNING STAR
// ============================================================

/// Morning Star - bullish three-bar reversal
#[derive(Debug, Clone, Copy, Default)]
pub struct MorningStarDetector {
    pub geometry: StarGeometry,
}

impl PatternDetector for MorningStarDetector {
    fn id(&self) -> PatternId {
        PatternId("MORNING_STAR")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        self.geometry
            .matches(bars, index, Direction::Bullish)
            .then(|| star_match(PatternDetector::id(self), Direction::Bullish, index))
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        self.geometry.confidence(bars, index, Direction::Bullish)
    }

    fn supports_confidence(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        self.geometry.validate()
    }
}

// ============================================================
// EVENING STAR
// ============================================================

/// Evening Star - bearish three-bar reversal
#[derive(Debug, Clone, Copy, Default)]
pub struct EveningStarDetector {
    pub geometry: StarGeometry,
}

impl PatternDetector for EveningStarDetector {
    fn id(&self) -> PatternId {
        PatternId("EVENING_STAR")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        self.geometry
            .matches(bars, index, Direction::Bearish)
            .then(|| star_match(PatternDetector::id(self), Direction::Bearish, index))
    }

    fn confidence_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<f64> {
        self.geometry.confidence(bars, index, Direction::Bearish)
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

const FIRST_BODY_RATIO: ParamMeta = ParamMeta::ratio(
    "first_body_ratio",
    0.5,
    (0.1, 1.0, 0.05),
    "Minimum body/range of the first candle",
);
const STAR_BODY_MULTIPLE: ParamMeta = ParamMeta::number(
    "star_body_multiple",
    0.3,
    (0.05, 0.95, 0.05),
    "Maximum star body as a multiple of the first body",
);

static STAR_PARAMS: &[ParamMeta] = &[FIRST_BODY_RATIO, STAR_BODY_MULTIPLE, MIN_RANGE_PARAM];

impl ParameterizedAlgorithm for MorningStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        STAR_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            geometry: StarGeometry::from_params(params)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "morning_star"
    }
}

impl ParameterizedAlgorithm for EveningStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        STAR_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let detector = Self {
            geometry: StarGeometry::from_params(params)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn implementation_id() -> &'static str {
        "evening_star"
    }
}
