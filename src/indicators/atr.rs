//! Average True Range.

use serde_json::Value;

use super::{last_of, Evaluation, Indicator};
use crate::{
    numeric::{self, Smoothing},
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    EngineError, Period, Result, OHLCV,
};

impl_with_defaults!(AtrIndicator);

const PERIOD: ParamMeta = ParamMeta::period("period", 14.0, (1.0, 500.0, 1.0), "Smoothing period");
const SMOOTHING: ParamMeta = ParamMeta::choice("smoothing", Smoothing::CHOICES, "True Range smoothing");
const VOLATILITY_LOOKBACK: ParamMeta = ParamMeta::period(
    "volatility_lookback",
    50.0,
    (2.0, 500.0, 1.0),
    "ATR values averaged for the volatility baseline",
);
const HIGH_RATIO: ParamMeta =
    ParamMeta::number("high_volatility_ratio", 1.5, (1.0, 10.0, 0.1), "ATR/baseline above which volatility is high");
const LOW_RATIO: ParamMeta =
    ParamMeta::number("low_volatility_ratio", 0.5, (0.0, 1.0, 0.1), "ATR/baseline below which volatility is low");

static ATR_PARAMS: &[ParamMeta] = &[PERIOD, SMOOTHING, VOLATILITY_LOOKBACK, HIGH_RATIO, LOW_RATIO];

#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: Period,
    pub smoothing: Smoothing,
    pub volatility_lookback: Period,
    pub high_volatility_ratio: f64,
    pub low_volatility_ratio: f64,
}

impl Default for AtrIndicator {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            smoothing: Smoothing::Wilder,
            volatility_lookback: Period::new_const(50),
            high_volatility_ratio: 1.5,
            low_volatility_ratio: 0.5,
        }
    }
}

impl AtrIndicator {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }
}

impl Indicator for AtrIndicator {
    fn indicator_type(&self) -> &'static str {
        "atr"
    }

    fn minimum_periods(&self) -> usize {
        self.period.get()
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let mut true_range = numeric::lift(&numeric::true_range(bars));
        let mut atr = numeric::smooth(&true_range, self.period.get(), self.smoothing);

        let min = self.minimum_periods();
        numeric::warm_up(&mut atr, min);
        numeric::warm_up(&mut true_range, min);

        IndicatorSeries::from([("atr".to_string(), atr), ("true_range".to_string(), true_range)])
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let atr = last_of(series, "atr");
        let close = bars.last().map_or(0.0, |b| b.close());
        let atr_percent = atr.map(|a| numeric::ratio_or(a, close, 0.0) * 100.0);

        let baseline = series
            .get("atr")
            .and_then(|s| numeric::trailing_mean(s, self.volatility_lookback.get()));
        let volatility = match (atr, baseline) {
            (Some(a), Some(base)) if a > self.high_volatility_ratio * base => "high",
            (Some(a), Some(base)) if a < self.low_volatility_ratio * base => "low",
            _ => "normal",
        };

        Evaluation::new(atr)
            .with_value("atr", atr)
            .with_value("true_range", last_of(series, "true_range"))
            .with_value("atr_percent", atr_percent)
            .with_meta("volatility", volatility)
            .with_meta("signal", volatility)
            .with_meta("volatility_baseline", baseline.map_or(Value::Null, Value::from))
            .with_meta("smoothing", self.smoothing.as_str())
    }

    fn validate_config(&self) -> Result<()> {
        if self.low_volatility_ratio >= self.high_volatility_ratio {
            return Err(EngineError::InvalidValue(
                "low_volatility_ratio must be < high_volatility_ratio",
            ));
        }
        Ok(())
    }
}

impl ParameterizedAlgorithm for AtrIndicator {
    fn param_meta() -> &'static [ParamMeta] {
        ATR_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let indicator = Self {
            period: params.period(&PERIOD)?,
            smoothing: params.choice(&SMOOTHING)?,
            volatility_lookback: params.period(&VOLATILITY_LOOKBACK)?,
            high_volatility_ratio: params.number(&HIGH_RATIO)?,
            low_volatility_ratio: params.number(&LOW_RATIO)?,
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    fn implementation_id() -> &'static str {
        "atr"
    }
}
