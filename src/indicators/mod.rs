//! Technical indicators
//!
//! Every indicator is a pure function of a bar window. `calculate_series`
//! produces the full named series (for charting); `calculate` summarizes the
//! last bar into an [`IndicatorResult`] and never raises: invalid input comes
//! back as a result with a non-`Ok` status.
//!
//! # Indicators
//!
//! - **Trend**: SMA, EMA (multi-period, explicit crossover contract)
//! - **Momentum**: RSI, MACD, Stochastic
//! - **Volatility**: ATR, Bollinger Bands
//! - **Directional**: ADX

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    result::{IndicatorResult, IndicatorSeries, ResultStatus},
    validate_bars, EngineError, Result, Timeframe, OHLCV,
};

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod crossover;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;

pub use adx::AdxIndicator;
pub use atr::AtrIndicator;
pub use bollinger::BollingerBandsIndicator;
pub use crossover::{Cross, CrossoverDetector};
pub use macd::MacdIndicator;
pub use moving_average::{EmaIndicator, Exponential, MovingAverageIndicator, Simple, SmaIndicator};
pub use rsi::RsiIndicator;
pub use stochastic::StochasticIndicator;

// ============================================================
// INDICATOR TRAIT
// ============================================================

/// Summary of the last bar, produced by [`Indicator::evaluate`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub value: Option<f64>,
    pub value_data: IndexMap<String, f64>,
    pub metadata: Map<String, Value>,
}

impl Evaluation {
    pub fn new(value: Option<f64>) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    /// Add a named sub-value; absent values are skipped
    pub fn with_value(mut self, key: &str, value: Option<f64>) -> Self {
        if let Some(v) = value {
            self.value_data.insert(key.to_string(), v);
        }
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Last value of a named series
pub fn last_of(series: &IndicatorSeries, key: &str) -> Option<f64> {
    series.get(key).and_then(|s| crate::numeric::last_value(s))
}

/// Indicator contract
pub trait Indicator: Send + Sync {
    /// Identifier reported in results, e.g. `"rsi"`
    fn indicator_type(&self) -> &'static str;

    /// Bars needed before the primary series has a value
    fn minimum_periods(&self) -> usize;

    /// Full named series, each aligned 1:1 with `bars`
    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries;

    /// Summarize the last bar. Only called with at least `minimum_periods()` bars.
    fn evaluate<T: OHLCV>(&self, bars: &[T], series: &IndicatorSeries) -> Evaluation;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    /// Compute the indicator for the last bar of `bars`.
    fn calculate<T: OHLCV>(&self, bars: &[T], symbol: &str, timeframe: &str) -> IndicatorResult {
        let kind = self.indicator_type();

        if let Err(e) = timeframe.parse::<Timeframe>() {
            return IndicatorResult::empty(kind, symbol, timeframe, ResultStatus::InvalidTimeframe, e.to_string());
        }
        if let Err(e) = validate_bars(bars) {
            return IndicatorResult::empty(kind, symbol, timeframe, ResultStatus::InvalidData, e.to_string());
        }

        let need = self.minimum_periods();
        let got = bars.len();
        if got < need {
            return IndicatorResult::empty(
                kind,
                symbol,
                timeframe,
                ResultStatus::InsufficientData { need, got },
                EngineError::InsufficientData { need, got }.to_string(),
            );
        }

        let series = self.calculate_series(bars);
        let eval = self.evaluate(bars, &series);

        let finite = eval.value.is_some_and(f64::is_finite)
            && eval.value_data.values().all(|v| v.is_finite());
        if !finite {
            return IndicatorResult::empty(
                kind,
                symbol,
                timeframe,
                ResultStatus::CalculationFailure,
                EngineError::CalculationFailure(format!("{kind} produced no finite value at the last bar"))
                    .to_string(),
            );
        }

        IndicatorResult {
            indicator_type: kind.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            value: eval.value,
            value_data: eval.value_data,
            calculation_timestamp: chrono::Utc::now(),
            metadata: eval.metadata,
            status: ResultStatus::Ok,
        }
    }
}

// ============================================================
// BUILTIN INDICATORS - generated via macro
// ============================================================

macro_rules! define_builtin_indicators {
    (
        $(
            $variant:ident($indicator:ty)
        ),* $(,)?
    ) => {
        /// All builtin indicators - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinIndicator {
            $($variant($indicator)),*
        }

        impl BuiltinIndicator {
            #[inline]
            pub fn indicator_type(&self) -> &'static str {
                match self {
                    $(Self::$variant(i) => Indicator::indicator_type(i)),*
                }
            }

            #[inline]
            pub fn minimum_periods(&self) -> usize {
                match self {
                    $(Self::$variant(i) => Indicator::minimum_periods(i)),*
                }
            }

            pub fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
                match self {
                    $(Self::$variant(i) => Indicator::calculate_series(i, bars)),*
                }
            }

            pub fn calculate<T: OHLCV>(
                &self,
                bars: &[T],
                symbol: &str,
                timeframe: &str,
            ) -> IndicatorResult {
                match self {
                    $(Self::$variant(i) => Indicator::calculate(i, bars, symbol, timeframe)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(i) => Indicator::validate_config(i)),*
                }
            }
        }

        $(
            impl From<$indicator> for BuiltinIndicator {
                fn from(indicator: $indicator) -> Self {
                    Self::$variant(indicator)
                }
            }
        )*
    };
}

define_builtin_indicators! {
    // Trend
    Sma(SmaIndicator),
    Ema(EmaIndicator),

    // Momentum
    Rsi(RsiIndicator),
    Macd(MacdIndicator),
    Stochastic(StochasticIndicator),

    // Volatility
    Atr(AtrIndicator),
    BollingerBands(BollingerBandsIndicator),

    // Directional
    Adx(AdxIndicator),
}
