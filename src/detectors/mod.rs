//! Candlestick pattern detectors
//!
//! # Pattern Categories
//!
//! - **Single-bar**: Doji (with subtypes), Hammer, Shooting Star, Hanging Man
//!   (trend-gated Hammer geometry)
//! - **Two-bar**: Engulfing, Harami
//! - **Three-bar**: Morning Star, Evening Star
//!
//! Every detector produces a boolean series aligned with the input bars and a
//! confidence score per firing (`0.6` base plus pattern-specific bonuses,
//! capped at `1.0`).

use std::collections::BTreeMap;

use crate::{
    result::{PatternDetectionResult, ResultStatus},
    validate_bars, PatternId, PatternMatch, Result, Timeframe, OHLCV,
};

pub mod helpers;
pub mod single_bar;
pub mod three_bar;
pub mod two_bar;

pub use single_bar::*;
pub use three_bar::*;
pub use two_bar::*;

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// Pattern detector contract
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;

    /// Bars needed before the first eligible index
    fn min_bars(&self) -> usize;

    /// Match ending at `index`, if the pattern fires there
    fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;

    /// Confidence of a firing at `index`
    fn confidence_at<T: OHLCV>(&self, _bars: &[T], _index: usize) -> Option<f64> {
        None
    }

    fn supports_confidence(&self) -> bool {
        false
    }

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    /// Every match, in bar order
    fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternMatch> {
        let first = self.min_bars().saturating_sub(1);
        (first..bars.len())
            .filter_map(|i| self.detect_at(bars, i))
            .collect()
    }

    /// Boolean series aligned 1:1 with `bars`
    fn detect<T: OHLCV>(&self, bars: &[T]) -> Vec<bool> {
        let mut out = vec![false; bars.len()];
        for m in self.scan(bars) {
            out[m.end_index] = true;
        }
        out
    }

    /// Confidence per fired index, or `None` when the detector does not score
    fn calculate_confidence<T: OHLCV>(&self, bars: &[T], fired: &[usize]) -> Option<BTreeMap<usize, f64>> {
        if !self.supports_confidence() {
            return None;
        }
        Some(
            fired
                .iter()
                .filter_map(|&i| {
                    self.confidence_at(bars, i)
                        .map(|c| (i, helpers::cap_confidence(c)))
                })
                .collect(),
        )
    }

    /// Run the detector over `bars` and package the outcome.
    ///
    /// Never raises: invalid timeframe, invalid bars and short input come back
    /// as all-false results with a non-`Ok` status.
    fn calculate<T: OHLCV>(
        &self,
        bars: &[T],
        symbol: &str,
        timeframe: &str,
        threshold: Option<f64>,
    ) -> PatternDetectionResult {
        let pattern = self.id().as_str();
        let n = bars.len();

        if timeframe.parse::<Timeframe>().is_err() {
            return PatternDetectionResult::empty(pattern, symbol, timeframe, n, ResultStatus::InvalidTimeframe);
        }
        if validate_bars(bars).is_err() {
            return PatternDetectionResult::empty(pattern, symbol, timeframe, n, ResultStatus::InvalidData);
        }
        let need = self.min_bars();
        if n < need {
            return PatternDetectionResult::empty(
                pattern,
                symbol,
                timeframe,
                n,
                ResultStatus::InsufficientData { need, got: n },
            );
        }

        let matches = self.scan(bars);
        let mut detections = vec![false; n];
        for m in &matches {
            detections[m.end_index] = true;
        }
        let fired: Vec<usize> = matches.iter().map(|m| m.end_index).collect();
        let confidence = self.calculate_confidence(bars, &fired);

        if let Some(threshold) = threshold {
            detections = filter_by_confidence(&detections, confidence.as_ref(), threshold);
        }
        let matches = matches
            .into_iter()
            .filter(|m| detections[m.end_index])
            .collect();

        PatternDetectionResult {
            pattern: pattern.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            detections,
            confidence,
            matches,
            confidence_threshold: threshold,
            calculation_timestamp: chrono::Utc::now(),
            status: ResultStatus::Ok,
        }
    }
}

/// Clear every firing whose confidence is below `threshold`.
///
/// Without confidence data (or without a score for a firing) detections pass
/// through unchanged, so the output never has more `true` entries than the
/// input.
pub fn filter_by_confidence(
    detections: &[bool],
    confidence: Option<&BTreeMap<usize, f64>>,
    threshold: f64,
) -> Vec<bool> {
    let Some(confidence) = confidence else {
        return detections.to_vec();
    };
    detections
        .iter()
        .enumerate()
        .map(|(i, &fired)| fired && confidence.get(&i).map_or(true, |&c| c >= threshold))
        .collect()
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            #[inline]
            pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect_at(d, bars, index)),*
                }
            }

            pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Vec<bool> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars)),*
                }
            }

            pub fn supports_confidence(&self) -> bool {
                match self {
                    $(Self::$variant(d) => PatternDetector::supports_confidence(d)),*
                }
            }

            pub fn calculate_confidence<T: OHLCV>(
                &self,
                bars: &[T],
                fired: &[usize],
            ) -> Option<BTreeMap<usize, f64>> {
                match self {
                    $(Self::$variant(d) => PatternDetector::calculate_confidence(d, bars, fired)),*
                }
            }

            pub fn calculate<T: OHLCV>(
                &self,
                bars: &[T],
                symbol: &str,
                timeframe: &str,
                threshold: Option<f64>,
            ) -> PatternDetectionResult {
                match self {
                    $(Self::$variant(d) => PatternDetector::calculate(d, bars, symbol, timeframe, threshold)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }

        $(
            impl From<$detector> for BuiltinDetector {
                fn from(detector: $detector) -> Self {
                    Self::$variant(detector)
                }
            }
        )*
    };
}

define_builtin_detectors! {
    // Single bar
    Doji(DojiDetector),
    Hammer(HammerDetector),
    HangingMan(HangingManDetector),
    ShootingStar(ShootingStarDetector),

    // Two bar
    Engulfing(EngulfingDetector),
    Harami(HaramiDetector),

    // Three bar
    MorningStar(MorningStarDetector),
    EveningStar(EveningStarDetector),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_without_confidence_passes_through() {
        let detections = vec![true, false, true];
        assert_eq!(filter_by_confidence(&detections, None, 0.9), detections);
    }

    #[test]
    fn test_filter_drops_low_confidence() {
        let detections = vec![true, false, true, true];
        let confidence = BTreeMap::from([(0, 0.65), (2, 0.9), (3, 0.7)]);
        let filtered = filter_by_confidence(&detections, Some(&confidence), 0.7);
        assert_eq!(filtered, vec![false, false, true, true]);
    }

    #[test]
    fn test_filter_keeps_unscored_firings() {
        let detections = vec![true, true];
        let confidence = BTreeMap::from([(0, 0.1)]);
        let filtered = filter_by_confidence(&detections, Some(&confidence), 0.5);
        assert_eq!(filtered, vec![false, true]);
    }

    #[test]
    fn test_all_builtins_validate() {
        let all: Vec<BuiltinDetector> = vec![
            DojiDetector::with_defaults().into(),
            HammerDetector::with_defaults().into(),
            HangingManDetector::with_defaults().into(),
            ShootingStarDetector::with_defaults().into(),
            EngulfingDetector::with_defaults().into(),
            HaramiDetector::with_defaults().into(),
            MorningStarDetector::with_defaults().into(),
            EveningStarDetector::with_defaults().into(),
        ];
        for d in all {
            assert!(d.validate_config().is_ok(), "{}", d.id());
            assert!(d.supports_confidence());
        }
    }
}
