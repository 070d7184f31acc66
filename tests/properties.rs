//! Property-based tests for indicator and detector invariants using proptest.

use proptest::prelude::*;

use yatie::detectors::*;
use yatie::indicators::*;
use yatie::prelude::*;

// ==================== Test Data Generators ====================

/// Random valid bars: high and low enclose open and close
fn arb_bars(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(
        (1.0..1000.0_f64, -0.05..0.05_f64, 0.0..0.05_f64, 0.0..0.05_f64, 0u64..100_000),
        min_len..=max_len,
    )
    .prop_map(|data| {
        data.into_iter()
            .enumerate()
            .map(|(i, (base, body_pct, up_pct, down_pct, volume))| {
                let open = base;
                let close = base * (1.0 + body_pct);
                let high = open.max(close) * (1.0 + up_pct);
                let low = open.min(close) * (1.0 - down_pct);
                Bar::from_millis(i as i64 * 60_000, open, high, low, close, volume)
            })
            .collect()
    })
}

fn all_indicators() -> Vec<BuiltinIndicator> {
    vec![
        SmaIndicator::with_defaults().into(),
        EmaIndicator::with_defaults().into(),
        RsiIndicator::with_defaults().into(),
        MacdIndicator::with_defaults().into(),
        StochasticIndicator::with_defaults().into(),
        AtrIndicator::with_defaults().into(),
        BollingerBandsIndicator::with_defaults().into(),
        AdxIndicator::with_defaults().into(),
    ]
}

fn all_detectors() -> Vec<BuiltinDetector> {
    vec![
        DojiDetector::with_defaults().into(),
        HammerDetector::with_defaults().into(),
        HangingManDetector::with_defaults().into(),
        ShootingStarDetector::with_defaults().into(),
        EngulfingDetector::with_defaults().into(),
        HaramiDetector::with_defaults().into(),
        MorningStarDetector::with_defaults().into(),
        EveningStarDetector::with_defaults().into(),
    ]
}

// ==================== Indicator Properties ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every series is as long as the input and undefined exactly during warm-up
    #[test]
    fn prop_series_aligned(bars in arb_bars(1, 120)) {
        for indicator in all_indicators() {
            let min = indicator.minimum_periods();
            for (name, values) in &indicator.calculate_series(&bars) {
                prop_assert_eq!(values.len(), bars.len(), "{} {}", indicator.indicator_type(), name);
                for (i, v) in values.iter().enumerate() {
                    prop_assert_eq!(v.is_some(), i + 1 >= min, "{} {} at {}", indicator.indicator_type(), name, i);
                }
            }
        }
    }

    /// Short input is reported, never computed
    #[test]
    fn prop_short_input_reports_need(bars in arb_bars(1, 40)) {
        for indicator in all_indicators() {
            let r = indicator.calculate(&bars, "X", "hourly");
            if bars.len() < indicator.minimum_periods() {
                prop_assert_eq!(r.status, ResultStatus::InsufficientData {
                    need: indicator.minimum_periods(),
                    got: bars.len(),
                });
                prop_assert!(r.value.is_none());
            } else {
                prop_assert!(r.is_ok());
            }
        }
    }

    /// RSI and Stochastic stay in [0, 100]
    #[test]
    fn prop_oscillators_bounded(bars in arb_bars(20, 150)) {
        let rsi = RsiIndicator::with_defaults().calculate_series(&bars);
        for v in rsi["rsi"].iter().flatten() {
            prop_assert!((0.0..=100.0).contains(v), "rsi {}", v);
        }
        let stoch = StochasticIndicator::with_defaults().calculate_series(&bars);
        for v in stoch["k"].iter().chain(&stoch["d"]).flatten() {
            prop_assert!((0.0..=100.0).contains(v), "stochastic {}", v);
        }
    }

    /// ATR is never negative and Bollinger bands are ordered
    #[test]
    fn prop_volatility_shapes(bars in arb_bars(25, 150)) {
        let atr = AtrIndicator::with_defaults().calculate_series(&bars);
        for v in atr["atr"].iter().flatten() {
            prop_assert!(*v >= 0.0);
        }
        let bb = BollingerBandsIndicator::with_defaults().calculate_series(&bars);
        for i in 0..bars.len() {
            if let (Some(l), Some(m), Some(u)) = (bb["lower"][i], bb["middle"][i], bb["upper"][i]) {
                prop_assert!(l <= m && m <= u);
            }
        }
    }

    /// MACD histogram is exactly line minus signal
    #[test]
    fn prop_macd_histogram_exact(bars in arb_bars(40, 150)) {
        let series = MacdIndicator::with_defaults().calculate_series(&bars);
        for i in 0..bars.len() {
            if let (Some(m), Some(s), Some(h)) = (series["macd"][i], series["signal"][i], series["histogram"][i]) {
                prop_assert_eq!(h, m - s);
            }
        }
    }
}

// ==================== Detector Properties ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// One flag per bar, nothing before the pattern can fit
    #[test]
    fn prop_detections_aligned(bars in arb_bars(1, 80)) {
        for detector in all_detectors() {
            let detections = detector.detect(&bars);
            prop_assert_eq!(detections.len(), bars.len());
            let first = detector.min_bars() - 1;
            for d in detections.iter().take(first) {
                prop_assert!(!d, "{} fired before warm-up", detector.id());
            }
        }
    }

    /// Confidence exists only for firings and lies in [0, 1]
    #[test]
    fn prop_confidence_bounded(bars in arb_bars(3, 80)) {
        for detector in all_detectors() {
            let r = detector.calculate(&bars, "X", "daily", None);
            let Some(confidence) = r.confidence.as_ref() else { continue };
            for (&i, &c) in confidence {
                prop_assert!(r.detections[i]);
                prop_assert!((0.0..=1.0).contains(&c), "{} confidence {}", detector.id(), c);
            }
        }
    }

    /// A threshold can only remove detections
    #[test]
    fn prop_threshold_only_removes(bars in arb_bars(3, 80), threshold in 0.0..=1.0_f64) {
        for detector in all_detectors() {
            let raw = detector.calculate(&bars, "X", "daily", None);
            let filtered = filter_by_confidence(&raw.detections, raw.confidence.as_ref(), threshold);
            prop_assert_eq!(filtered.len(), raw.detections.len());
            for (r, f) in raw.detections.iter().zip(&filtered) {
                prop_assert!(*r || !*f);
            }

            let thresholded = detector.calculate(&bars, "X", "daily", Some(threshold));
            prop_assert_eq!(thresholded.detections, filtered);
        }
    }
}
