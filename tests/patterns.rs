//! Integration tests for candlestick pattern detection.

use yatie::detectors::*;
use yatie::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c, v: 1000.0 }
    }

    fn with_volume(mut self, v: f64) -> Self {
        self.v = v;
        self
    }
}

impl OHLCV for TestBar {
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

/// Generate downtrend bars
fn make_downtrend(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let base = 100.0 - (i as f64) * 2.0;
            TestBar::new(base + 1.0, base + 2.0, base - 1.0, base - 0.5)
        })
        .collect()
}

/// Generate uptrend bars
fn make_uptrend(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let base = 100.0 + (i as f64) * 2.0;
            TestBar::new(base - 0.5, base + 1.5, base - 1.5, base + 1.0)
        })
        .collect()
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

// ============================================================
// SINGLE BAR PATTERN TESTS
// ============================================================

#[test]
fn test_doji_reference_example() {
    let doji = DojiDetector::with_defaults();
    assert_eq!(doji.detect(&[TestBar::new(100.0, 102.0, 98.0, 100.05)]), vec![true]);
    assert_eq!(doji.detect(&[TestBar::new(100.0, 102.0, 98.0, 110.0)]), vec![false]);
}

#[test]
fn test_doji_after_downtrend_scores_higher() {
    let doji = DojiDetector::with_defaults();
    let candle = TestBar::new(80.0, 85.0, 75.0, 80.0);

    let mut trending = make_downtrend(10);
    trending.push(candle);
    let alone = [candle];

    let r = doji.calculate(&trending, "AAPL", "daily", None);
    let in_trend = r.confidence_at(10).unwrap();
    let isolated = doji.confidence_at(&alone, 0).unwrap();
    assert!(in_trend > isolated);
    assert_eq!(r.matches[0].variant, Some("long_legged"));
    assert_eq!(r.matches[0].direction, Direction::Neutral);
}

#[test]
fn test_hammer_at_end_of_decline() {
    let mut bars = make_downtrend(10);
    bars.push(TestBar::new(79.0, 80.5, 72.0, 80.0));

    let r = HammerDetector::with_defaults().calculate(&bars, "AAPL", "daily", None);
    assert!(r.detections[10]);
    assert_eq!(r.matches.last().unwrap().direction, Direction::Bullish);
    assert!(r.confidence_at(10).unwrap() >= 0.85);
}

#[test]
fn test_hanging_man_vs_hammer() {
    let mut bars = make_uptrend(10);
    let top = bars[9].c + 3.0;
    bars.push(TestBar::new(top - 1.0, top + 0.5, top - 8.0, top));

    assert!(HammerDetector::with_defaults().detect(&bars)[10]);
    let hanging = HangingManDetector::with_defaults().calculate(&bars, "AAPL", "daily", None);
    assert!(hanging.detections[10]);
    assert_eq!(hanging.matches[0].direction, Direction::Bearish);
}

#[test]
fn test_shooting_star_after_advance() {
    let mut bars = make_uptrend(10);
    bars.push(TestBar::new(121.0, 128.0, 119.5, 120.0));
    let r = ShootingStarDetector::with_defaults().calculate(&bars, "AAPL", "daily", None);
    assert!(r.detections[10]);
    assert!(r.confidence_at(10).unwrap() > 0.7);
}

// ============================================================
// MULTI BAR PATTERN TESTS
// ============================================================

#[test]
fn test_engulfing_strict_containment() {
    let engulfing = EngulfingDetector::with_defaults();
    let prev = TestBar::new(101.0, 101.5, 99.5, 100.0);

    let strict = [prev, TestBar::new(99.5, 102.5, 99.0, 102.0)];
    assert_eq!(engulfing.detect(&strict), vec![false, true]);

    let equal_bottom = [prev, TestBar::new(100.0, 102.5, 99.0, 102.0)];
    assert_eq!(engulfing.detect(&equal_bottom), vec![false, false]);

    let equal_top = [prev, TestBar::new(99.5, 102.5, 99.0, 101.0)];
    assert_eq!(engulfing.detect(&equal_top), vec![false, false]);
}

#[test]
fn test_harami_inside_bar() {
    let bars = [
        TestBar::new(110.0, 110.5, 99.5, 100.0),
        TestBar::new(104.0, 106.0, 103.0, 105.0),
    ];
    let m = HaramiDetector::with_defaults().scan(&bars);
    assert_eq!(m.len(), 1);
    assert_eq!(m[0].direction, Direction::Bullish);
    assert_eq!((m[0].start_index, m[0].end_index), (0, 1));
}

#[test]
fn test_morning_and_evening_star() {
    let mut bars = make_downtrend(5);
    bars.extend([
        TestBar::new(92.0, 92.5, 83.5, 84.0),
        TestBar::new(83.0, 83.5, 81.5, 82.5),
        TestBar::new(83.5, 91.5, 83.0, 91.0).with_volume(4000.0),
    ]);
    let r = MorningStarDetector::with_defaults().calculate(&bars, "AAPL", "daily", None);
    assert_eq!(r.fired_indices(), vec![7]);
    assert_eq!(r.matches[0].start_index, 5);
    // base + gap + volume
    assert!((r.confidence_at(7).unwrap() - 0.8).abs() < 1e-9);
    assert_eq!(EveningStarDetector::with_defaults().detect(&bars).iter().filter(|d| **d).count(), 0);
}

// ============================================================
// CONTRACT
// ============================================================

#[test]
fn test_detection_length_and_warm_up() {
    let mut bars = make_downtrend(15);
    bars.extend(make_uptrend(15));
    for detector in all_detectors() {
        let detections = detector.detect(&bars);
        assert_eq!(detections.len(), bars.len(), "{}", detector.id());
        let first = detector.min_bars() - 1;
        assert!(detections[..first].iter().all(|d| !d), "{} fired early", detector.id());
    }
}

#[test]
fn test_calculate_short_input() {
    let bars = make_downtrend(2);
    let r = MorningStarDetector::with_defaults().calculate(&bars, "AAPL", "daily", None);
    assert_eq!(r.status, ResultStatus::InsufficientData { need: 3, got: 2 });
    assert_eq!(r.detections, vec![false, false]);
}

#[test]
fn test_calculate_invalid_timeframe() {
    let r = DojiDetector::with_defaults().calculate(&make_downtrend(5), "AAPL", "quarterly", None);
    assert_eq!(r.status, ResultStatus::InvalidTimeframe);
    assert_eq!(r.detections.len(), 5);
    assert_eq!(r.detection_count(), 0);
}

#[test]
fn test_threshold_never_adds_detections() {
    let mut bars = make_downtrend(12);
    bars.push(TestBar::new(79.0, 80.5, 72.0, 80.0));
    bars.push(TestBar::new(80.0, 85.0, 75.0, 80.0));
    for detector in all_detectors() {
        let raw = detector.calculate(&bars, "AAPL", "daily", None);
        let strict = detector.calculate(&bars, "AAPL", "daily", Some(0.9));
        for (r, s) in raw.detections.iter().zip(&strict.detections) {
            assert!(*r || !*s, "{} gained a detection", detector.id());
        }
        assert_eq!(strict.confidence_threshold, Some(0.9));
        assert!(strict.matches.iter().all(|m| strict.detections[m.end_index]));
    }
}

#[test]
fn test_confidence_only_on_firings() {
    let mut bars = make_downtrend(12);
    bars.push(TestBar::new(79.0, 80.5, 72.0, 80.0));
    for detector in all_detectors() {
        let r = detector.calculate(&bars, "AAPL", "daily", None);
        let confidence = r.confidence.as_ref().unwrap();
        for (&i, &c) in confidence {
            assert!(r.detections[i]);
            assert!((0.0..=1.0).contains(&c));
        }
    }
}

#[test]
fn test_result_serializes_to_json() {
    let mut bars = make_downtrend(5);
    bars.push(TestBar::new(90.0, 95.0, 85.0, 90.0));
    let r = DojiDetector::with_defaults().calculate(&bars, "AAPL", "daily", Some(0.5));
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["pattern"], "DOJI");
    assert_eq!(json["detections"].as_array().unwrap().len(), 6);
    assert_eq!(json["matches"][0]["direction"], "neutral");
    assert_eq!(json["confidence_threshold"], 0.5);
}
