//! Bollinger Bands.
//!
//! Middle band is the SMA of closes; the outer bands sit `k` population
//! standard deviations away.

use serde_json::Value;

use super::{last_of, Evaluation, Indicator};
use crate::{
    numeric,
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    series::closes,
    EngineError, Period, Result, OHLCV,
};

impl_with_defaults!(BollingerBandsIndicator);

const PERIOD: ParamMeta = ParamMeta::period("period", 20.0, (2.0, 500.0, 1.0), "SMA period");
const STD_DEV: ParamMeta =
    ParamMeta::number("std_dev", 2.0, (0.0, 10.0, 0.5), "Band width in standard deviations");
const SQUEEZE: ParamMeta =
    ParamMeta::number("squeeze_threshold", 10.0, (0.0, 100.0, 1.0), "Bandwidth (%) below which bands squeeze");
const EXPANSION_RATIO: ParamMeta = ParamMeta::number(
    "expansion_ratio",
    1.5,
    (1.0, 10.0, 0.1),
    "Bandwidth multiple of its trailing mean that flags expansion",
);
const EXPANSION_LOOKBACK: ParamMeta = ParamMeta::period(
    "expansion_lookback",
    50.0,
    (2.0, 500.0, 1.0),
    "Bandwidth values averaged for the expansion check",
);

static BOLLINGER_PARAMS: &[ParamMeta] = &[PERIOD, STD_DEV, SQUEEZE, EXPANSION_RATIO, EXPANSION_LOOKBACK];

#[derive(Debug, Clone)]
pub struct BollingerBandsIndicator {
    pub period: Period,
    pub std_dev: f64,
    pub squeeze_threshold: f64,
    pub expansion_ratio: f64,
    pub expansion_lookback: Period,
}

impl Default for BollingerBandsIndicator {
    fn default() -> Self {
        Self {
            period: Period::new_const(20),
            std_dev: 2.0,
            squeeze_threshold: 10.0,
            expansion_ratio: 1.5,
            expansion_lookback: Period::new_const(50),
        }
    }
}

impl BollingerBandsIndicator {
    pub fn new(period: Period, std_dev: f64) -> Result<Self> {
        let indicator = Self {
            period,
            std_dev,
            ..Self::default()
        };
        indicator.validate_config()?;
        Ok(indicator)
    }
}

impl Indicator for BollingerBandsIndicator {
    fn indicator_type(&self) -> &'static str {
        "bollinger_bands"
    }

    fn minimum_periods(&self) -> usize {
        self.period.get()
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let closes = closes(bars);
        let p = self.period.get();
        let middle = numeric::rolling_mean(&closes, p);
        let std = numeric::rolling_std(&closes, p);

        let n = closes.len();
        let mut upper = vec![None; n];
        let mut lower = vec![None; n];
        let mut percent_b = vec![None; n];
        let mut bandwidth = vec![None; n];
        for i in 0..n {
            if let (Some(m), Some(s)) = (middle[i], std[i]) {
                let (u, l) = (m + self.std_dev * s, m - self.std_dev * s);
                upper[i] = Some(u);
                lower[i] = Some(l);
                percent_b[i] = Some(numeric::ratio_or(closes[i] - l, u - l, 0.5));
                bandwidth[i] = Some(numeric::ratio_or(u - l, m, 0.0) * 100.0);
            }
        }

        IndicatorSeries::from([
            ("middle".to_string(), middle),
            ("upper".to_string(), upper),
            ("lower".to_string(), lower),
            ("percent_b".to_string(), percent_b),
            ("bandwidth".to_string(), bandwidth),
        ])
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let middle = last_of(series, "middle");
        let upper = last_of(series, "upper");
        let lower = last_of(series, "lower");
        let bandwidth = last_of(series, "bandwidth");
        let close = bars.last().map(|b| b.close());

        let position = match (close, upper, lower) {
            (Some(c), Some(u), _) if c > u => "above_upper",
            (Some(c), _, Some(l)) if c < l => "below_lower",
            _ => "within_bands",
        };
        let signal = match position {
            "above_upper" => "overbought",
            "below_lower" => "oversold",
            _ => "neutral",
        };

        let squeeze = bandwidth.is_some_and(|bw| bw < self.squeeze_threshold);
        let baseline = series
            .get("bandwidth")
            .and_then(|s| numeric::trailing_mean(s, self.expansion_lookback.get()));
        let expansion = match (bandwidth, baseline) {
            (Some(bw), Some(base)) => bw > self.expansion_ratio * base,
            _ => false,
        };

        Evaluation::new(middle)
            .with_value("upper", upper)
            .with_value("middle", middle)
            .with_value("lower", lower)
            .with_value("percent_b", last_of(series, "percent_b"))
            .with_value("bandwidth", bandwidth)
            .with_meta("position", position)
            .with_meta("signal", signal)
            .with_meta("squeeze", squeeze)
            .with_meta("expansion", expansion)
            .with_meta("bandwidth_baseline", baseline.map_or(Value::Null, Value::from))
            .with_meta("std_dev", self.std_dev)
    }

    fn validate_config(&self) -> Result<()> {
        if self.std_dev.is_nan() || self.std_dev <= 0.0 {
            return Err(EngineError::InvalidValue("std_dev must be > 0"));
        }
        Ok(())
    }
}

impl ParameterizedAlgorithm for BollingerBandsIndicator {
    fn param_meta() -> &'static [ParamMeta] {
        BOLLINGER_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let indicator = Self {
            period: params.period(&PERIOD)?,
            std_dev: params.number(&STD_DEV)?,
            squeeze_threshold: params.number(&SQUEEZE)?,
            expansion_ratio: params.number(&EXPANSION_RATIO)?,
            expansion_lookback: params.period(&EXPANSION_LOOKBACK)?,
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    fn implementation_id() -> &'static str {
        "bollinger_bands"
    }
}
