//! Relative Strength Index.
//!
//! `RSI = 100 − 100 / (1 + avg_gain / avg_loss)` with Wilder-smoothed (or
//! simple) averages of close-to-close gains and losses. An average loss of
//! zero maps to 100, or to 50 when the average gain is zero as well.

use serde_json::Value;

use super::{last_of, Evaluation, Indicator};
use crate::{
    numeric::{self, Smoothing},
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    series::closes,
    EngineError, Period, Result, OHLCV,
};

impl_with_defaults!(RsiIndicator);

const PERIOD: ParamMeta = ParamMeta::period("period", 14.0, (1.0, 500.0, 1.0), "Smoothing period");
const OVERBOUGHT: ParamMeta =
    ParamMeta::number("overbought", 70.0, (50.0, 100.0, 5.0), "Overbought level");
const OVERSOLD: ParamMeta = ParamMeta::number("oversold", 30.0, (0.0, 50.0, 5.0), "Oversold level");
const SMOOTHING: ParamMeta =
    ParamMeta::choice("smoothing", Smoothing::CHOICES, "Average gain/loss smoothing");
const DIVERGENCE_LOOKBACK: ParamMeta = ParamMeta::period(
    "divergence_lookback",
    50.0,
    (4.0, 500.0, 1.0),
    "Bars inspected by the divergence check",
);

static RSI_PARAMS: &[ParamMeta] = &[PERIOD, OVERBOUGHT, OVERSOLD, SMOOTHING, DIVERGENCE_LOOKBACK];

/// RSI with overbought/oversold classification and a divergence check
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: Period,
    pub overbought: f64,
    pub oversold: f64,
    pub smoothing: Smoothing,
    pub divergence_lookback: Period,
}

impl Default for RsiIndicator {
    fn default() -> Self {
        Self {
            period: Period::new_const(14),
            overbought: 70.0,
            oversold: 30.0,
            smoothing: Smoothing::Wilder,
            divergence_lookback: Period::new_const(50),
        }
    }
}

impl RsiIndicator {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss <= 0.0 {
            if avg_gain <= 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            let rs = avg_gain / avg_loss;
            (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
        }
    }

    /// Compare price and RSI extrema between the two halves of the recent
    /// window.
    ///
    /// A new price high with a lower RSI is bearish divergence; a new price low
    /// with a higher RSI is bullish divergence.
    pub fn divergence(&self, closes: &[f64], rsi: &[Option<f64>]) -> &'static str {
        let n = closes.len().min(rsi.len());
        let start = n.saturating_sub(self.divergence_lookback.get());
        let window: Vec<(usize, f64, f64)> = (start..n)
            .filter_map(|i| rsi[i].map(|r| (i, closes[i], r)))
            .collect();
        if window.len() < 4 {
            return "none";
        }

        let (first, second) = window.split_at(window.len() / 2);
        let max_by_price = |half: &[(usize, f64, f64)]| {
            half.iter().copied().fold(None, |best: Option<(usize, f64, f64)>, x| match best {
                Some(b) if b.1 >= x.1 => Some(b),
                _ => Some(x),
            })
        };
        let min_by_price = |half: &[(usize, f64, f64)]| {
            half.iter().copied().fold(None, |best: Option<(usize, f64, f64)>, x| match best {
                Some(b) if b.1 <= x.1 => Some(b),
                _ => Some(x),
            })
        };

        if let (Some(h1), Some(h2)) = (max_by_price(first), max_by_price(second)) {
            if h2.1 > h1.1 && h2.2 < h1.2 {
                return "bearish";
            }
        }
        if let (Some(l1), Some(l2)) = (min_by_price(first), min_by_price(second)) {
            if l2.1 < l1.1 && l2.2 > l1.2 {
                return "bullish";
            }
        }
        "none"
    }
}

impl Indicator for RsiIndicator {
    fn indicator_type(&self) -> &'static str {
        "rsi"
    }

    fn minimum_periods(&self) -> usize {
        self.period.get() + 1
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let closes = closes(bars);
        let p = self.period.get();

        let mut gains = vec![None; closes.len()];
        let mut losses = vec![None; closes.len()];
        for i in 1..closes.len() {
            let delta = closes[i] - closes[i - 1];
            gains[i] = Some(delta.max(0.0));
            losses[i] = Some((-delta).max(0.0));
        }

        let mut avg_gain = numeric::smooth(&gains, p, self.smoothing);
        let mut avg_loss = numeric::smooth(&losses, p, self.smoothing);
        let mut rsi: Vec<Option<f64>> = avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(g, l)| Some(Self::rsi_from((*g)?, (*l)?)))
            .collect();

        let min = self.minimum_periods();
        for s in [&mut rsi, &mut avg_gain, &mut avg_loss] {
            numeric::warm_up(s, min);
        }

        IndicatorSeries::from([
            ("rsi".to_string(), rsi),
            ("avg_gain".to_string(), avg_gain),
            ("avg_loss".to_string(), avg_loss),
        ])
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let rsi = last_of(series, "rsi");
        let signal = match rsi {
            Some(v) if v >= self.overbought => "overbought",
            Some(v) if v <= self.oversold => "oversold",
            _ => "neutral",
        };
        let divergence = series
            .get("rsi")
            .map_or("none", |values| self.divergence(&closes(bars), values));

        Evaluation::new(rsi)
            .with_value("rsi", rsi)
            .with_value("avg_gain", last_of(series, "avg_gain"))
            .with_value("avg_loss", last_of(series, "avg_loss"))
            .with_meta("signal", signal)
            .with_meta("overbought", self.overbought)
            .with_meta("oversold", self.oversold)
            .with_meta("smoothing", self.smoothing.as_str())
            .with_meta("divergence", Value::from(divergence))
    }

    fn validate_config(&self) -> Result<()> {
        if self.oversold >= self.overbought {
            return Err(EngineError::InvalidValue("oversold must be < overbought"));
        }
        Ok(())
    }
}

impl ParameterizedAlgorithm for RsiIndicator {
    fn param_meta() -> &'static [ParamMeta] {
        RSI_PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let indicator = Self {
            period: params.period(&PERIOD)?,
            overbought: params.number(&OVERBOUGHT)?,
            oversold: params.number(&OVERSOLD)?,
            smoothing: params.choice(&SMOOTHING)?,
            divergence_lookback: params.period(&DIVERGENCE_LOOKBACK)?,
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    fn implementation_id() -> &'static str {
        "rsi"
    }
}
