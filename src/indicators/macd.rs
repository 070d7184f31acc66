//! Moving Average Convergence Divergence.
//!
//! `macd = EMA(fast) − EMA(slow)`, `signal = EMA(macd, signal_period)`,
//! `histogram = macd − signal`. The primary value is the MACD line.

use super::{last_of, Cross, CrossoverDetector, Evaluation, Indicator};
use crate::{
    numeric,
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    series::closes,
    EngineError, Period, Result, OHLCV,
};

impl_with_defaults!(MacdIndicator);

const FAST: ParamMeta = ParamMeta::period("fast_period", 12.0, (1.0, 200.0, 1.0), "Fast EMA period");
const SLOW: ParamMeta = ParamMeta::period("slow_period", 26.0, (2.0, 400.0, 1.0), "Slow EMA period");
const SIGNAL: ParamMeta =
    ParamMeta::period("signal_period", 9.0, (1.0, 100.0, 1.0), "Signal line EMA period");

static MACD_PARAMS: &[ParamMeta] = &[FAST, SLOW, SIGNAL];

#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast_period: Period,
    pub slow_period: Period,
    pub signal_period: Period,
}

impl Default for MacdIndicator {
    fn default() -> Self {
        Self {
            fast_period: Period::new_const(12),
            slow_period: Period::new_const(26),
            signal_period: Period::new_const(9),
        }
    }
}

impl MacdIndicator {
    pub fn new(fast: Period, slow: Period, signal: Period) -> Result<Self> {
        let indicator = Self {
            fast_period: fast,
            slow_period: slow,
            signal_period: signal,
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    fn crossover() -> CrossoverDetector {
        CrossoverDetector::new("macd", "signal")
    }
}

impl Indicator for MacdIndicator {
    fn indicator_type(&self) -> &'static str {
        "macd"
    }

    fn minimum_periods(&self) -> usize {
        self.slow_period.get() + self.signal_period.get() - 1
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let closes = numeric::lift(&closes(bars));
        let fast = numeric::ema(&closes, self.fast_period.get());
        let slow = numeric::ema(&closes, self.slow_period.get());

        let macd: Vec<Option<f64>> = fast
            .iter()
            .zip(&slow)
            .map(|(f, s)| Some((*f)? - (*s)?))
            .collect();
        let mut signal = numeric::ema(&macd, self.signal_period.get());

        let min = self.minimum_periods();
        let mut macd = macd;
        numeric::warm_up(&mut macd, min);
        numeric::warm_up(&mut signal, min);

        let histogram: Vec<Option<f64>> = macd
            .iter()
            .zip(&signal)
            .map(|(m, s)| Some((*m)? - (*s)?))
            .collect();

        IndicatorSeries::from([
            ("macd".to_string(), macd),
            ("signal".to_string(), signal),
            ("histogram".to_string(), histogram),
        ])
    }

    fn evaluate<T: OHLCV>(&self, _bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let macd = last_of(series, "macd");
        let histogram = last_of(series, "histogram");

        let cross = Self::crossover().detect(series);
        let signal = match (cross, histogram) {
            (Some(Cross::Bullish), _) => "bullish_crossover",
            (Some(Cross::Bearish), _) => "bearish_crossover",
            (None, Some(h)) if h > 0.0 => "bullish",
            (None, Some(h)) if h < 0.0 => "bearish",
            _ => "neutral",
        };

        Evaluation::new(macd)
            .with_value("macd", macd)
            .with_value("signal", last_of(series, "signal"))
            .with_value("histogram", histogram)
            .with_meta("signal", signal)
            .with_meta("crossover", cross.is_some())
            .with_meta("fast_period", self.fast_period.get())
            .with_meta("slow_period", self.slow_period.get())
            .with_meta("signal_period", self.signal_period.get())
    }

    fn validate_config(&self) -> Result<()> {
        if self.fast_period >= self.slow_period {
            return Err(EngineError::InvalidValue("fast_period must be < slow_period"));
        }
        Ok(())
    }
}

impl ParameterizedAlgorithm for MacdIndicator {
    fn param_meta() -> &'static [ParamMeta] {
        MACD_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        Self::new(
            params.period(&FAST)?,
            params.period(&SLOW)?,
            params.period(&SIGNAL)?,
        )
    }

    fn implementation_id() -> &'static str {
        "macd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Bar;

    fn wave(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 / 4.0).sin() * 10.0;
                Bar::from_millis(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1_000)
            })
            .collect()
    }

    #[test]
    fn test_value_is_macd_line() {
        let bars = wave(80);
        let macd = MacdIndicator::with_defaults();
        let r = macd.calculate(&bars, "AAPL", "daily");
        assert!(r.is_ok());
        assert_eq!(r.value, r.get("macd"));
        assert_ne!(r.value, r.get("histogram"));
    }

    #[test]
    fn test_histogram_is_exact_difference() {
        let bars = wave(80);
        let series = MacdIndicator::with_defaults().calculate_series(&bars);
        for i in 0..bars.len() {
            match (series["macd"][i], series["signal"][i], series["histogram"][i]) {
                (Some(m), Some(s), Some(h)) => assert_eq!(h, m - s),
                (_, _, h) => assert!(h.is_none()),
            }
        }
    }

    #[test]
    fn test_warm_up_shared() {
        let bars = wave(40);
        let macd = MacdIndicator::with_defaults();
        let series = macd.calculate_series(&bars);
        assert_eq!(macd.minimum_periods(), 34);
        assert!(series["macd"][32].is_none());
        assert!(series["macd"][33].is_some());
        assert!(series["signal"][33].is_some());
    }

    #[test]
    fn test_fast_must_be_below_slow() {
        let params = ParamSet::new().with("fast_period", 26.0).with("slow_period", 12.0);
        assert!(MacdIndicator::with_params(&params).is_err());
        let params = ParamSet::new().with("fast_period", 12.0).with("slow_period", 12.0);
        assert!(MacdIndicator::with_params(&params).is_err());
    }

    #[test]
    fn test_trend_classification() {
        let bars: Vec<Bar> = (0..60)
            .map(|i| {
                let c = 100.0 + i as f64 * (1.0 + i as f64 * 0.05);
                Bar::from_millis(i as i64 * 60_000, c, c + 1.0, c - 1.0, c, 1_000)
            })
            .collect();
        let r = MacdIndicator::with_defaults().calculate(&bars, "AAPL", "daily");
        assert!(r.value.unwrap() > 0.0);
        assert!(matches!(r.signal(), Some("bullish") | Some("bullish_crossover")));
    }
}
