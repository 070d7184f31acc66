//! Stochastic Oscillator.
//!
//! `%K = (close − lowest_low) / (highest_high − lowest_low) × 100` over the
//! k-window (50 when the range is flat); `%D` is the simple mean of `%K` over
//! the d-window.

use super::{last_of, Cross, CrossoverDetector, Evaluation, Indicator};
use crate::{
    numeric,
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    series::{closes, highs, lows},
    EngineError, Period, Result, OHLCV,
};

impl_with_defaults!(StochasticIndicator);

const K_PERIOD: ParamMeta = ParamMeta::period("k_period", 14.0, (1.0, 500.0, 1.0), "%K lookback");
const D_PERIOD: ParamMeta = ParamMeta::period("d_period", 3.0, (1.0, 100.0, 1.0), "%D smoothing");
const OVERBOUGHT: ParamMeta =
    ParamMeta::number("overbought", 80.0, (50.0, 100.0, 5.0), "Overbought level");
const OVERSOLD: ParamMeta = ParamMeta::number("oversold", 20.0, (0.0, 50.0, 5.0), "Oversold level");

static STOCHASTIC_PARAMS: &[ParamMeta] = &[K_PERIOD, D_PERIOD, OVERBOUGHT, OVERSOLD];

const BASE_CONFIDENCE: f64 = 0.5;
const CROSSOVER_CONFIDENCE: f64 = 0.65;
const ZONE_CROSSOVER_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct StochasticIndicator {
    pub k_period: Period,
    pub d_period: Period,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for StochasticIndicator {
    fn default() -> Self {
        Self {
            k_period: Period::new_const(14),
            d_period: Period::new_const(3),
            overbought: 80.0,
            oversold: 20.0,
        }
    }
}

impl StochasticIndicator {
    pub fn new(k_period: Period, d_period: Period) -> Self {
        Self {
            k_period,
            d_period,
            ..Self::default()
        }
    }

    fn crossover() -> CrossoverDetector {
        CrossoverDetector::new("k", "d")
    }
}

impl Indicator for StochasticIndicator {
    fn indicator_type(&self) -> &'static str {
        "stochastic"
    }

    fn minimum_periods(&self) -> usize {
        self.k_period.get() + self.d_period.get() - 1
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let kp = self.k_period.get();
        let closes = closes(bars);
        let highest = numeric::rolling_max(&highs(bars), kp);
        let lowest = numeric::rolling_min(&lows(bars), kp);

        let mut k: Vec<Option<f64>> = closes
            .iter()
            .zip(highest.iter().zip(&lowest))
            .map(|(&c, (hh, ll))| {
                let (hh, ll) = ((*hh)?, (*ll)?);
                Some(numeric::ratio_or(c - ll, hh - ll, 0.5) * 100.0)
            })
            .collect();
        let mut d = numeric::rolling_mean_opt(&k, self.d_period.get());

        let min = self.minimum_periods();
        numeric::warm_up(&mut k, min);
        numeric::warm_up(&mut d, min);

        IndicatorSeries::from([("k".to_string(), k), ("d".to_string(), d)])
    }

    fn evaluate<T: OHLCV>(&self, _bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let k = last_of(series, "k");
        let d = last_of(series, "d");

        let zone = match k {
            Some(v) if v >= self.overbought => "overbought",
            Some(v) if v <= self.oversold => "oversold",
            _ => "neutral",
        };

        let cross = Self::crossover().detect(series);
        let (low, high) = match (k, d) {
            (Some(k), Some(d)) => (k.min(d), k.max(d)),
            _ => (f64::NAN, f64::NAN),
        };
        let confidence = match cross {
            Some(Cross::Bullish) if low <= self.oversold => ZONE_CROSSOVER_CONFIDENCE,
            Some(Cross::Bearish) if high >= self.overbought => ZONE_CROSSOVER_CONFIDENCE,
            Some(_) => CROSSOVER_CONFIDENCE,
            None => BASE_CONFIDENCE,
        };
        let signal = cross.map_or(zone, |c| Self::crossover().label(c));

        Evaluation::new(k)
            .with_value("k", k)
            .with_value("d", d)
            .with_meta("signal", signal)
            .with_meta("zone", zone)
            .with_meta("crossover", cross.is_some())
            .with_meta("confidence", confidence)
            .with_meta("overbought", self.overbought)
            .with_meta("oversold", self.oversold)
    }

    fn validate_config(&self) -> Result<()> {
        if self.oversold >= self.overbought {
            return Err(EngineError::InvalidValue("oversold must be < overbought"));
        }
        Ok(())
    }
}

impl ParameterizedAlgorithm for StochasticIndicator {
    fn param_meta() -> &'static [ParamMeta] {
        STOCHASTIC_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let indicator = Self {
            k_period: params.period(&K_PERIOD)?,
            d_period: params.period(&D_PERIOD)?,
            overbought: params.number(&OVERBOUGHT)?,
            oversold: params.number(&OVERSOLD)?,
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    fn implementation_id() -> &'static str {
        "stochastic"
    }
}
