//! Simple and exponential moving averages.
//!
//! Both support several periods at once (`periods = [20, 50]`); the primary
//! value is the first configured period. Each family also watches one fixed
//! crossover pair, computed independently of the requested periods:
//! SMA 50×200 (`golden_cross` / `death_cross`) and EMA 12×26
//! (`bullish_crossover` / `bearish_crossover`).

use std::fmt::Debug;
use std::marker::PhantomData;

use serde_json::Value;

use super::{last_of, CrossoverDetector, Evaluation, Indicator};
use crate::{
    numeric::{self, Series},
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    result::IndicatorSeries,
    series::closes,
    EngineError, Period, Result, OHLCV,
};

/// Averaging family of a [`MovingAverageIndicator`]
pub trait Averaging: Debug + Clone + Copy + Default + Send + Sync + 'static {
    const ID: &'static str;
    const CROSS_FAST: f64;
    const CROSS_SLOW: f64;
    const BULLISH: &'static str;
    const BEARISH: &'static str;
    const PARAMS: &'static [ParamMeta];

    fn average(values: &[f64], period: usize) -> Series;
}

/// Unweighted rolling mean
#[derive(Debug, Clone, Copy, Default)]
pub struct Simple;

/// Standard EMA, `α = 2/(p+1)`, seeded with the SMA of the first `p` closes
#[derive(Debug, Clone, Copy, Default)]
pub struct Exponential;

const PERIODS: ParamMeta =
    ParamMeta::period_list("periods", 20.0, (1.0, 1000.0, 1.0), "Averaging period or list of periods");

const SMA_PARAMS: &[ParamMeta] = &[
    PERIODS,
    ParamMeta::period("cross_fast", 50.0, (1.0, 1000.0, 1.0), "Fast period of the crossover pair"),
    ParamMeta::period("cross_slow", 200.0, (1.0, 1000.0, 1.0), "Slow period of the crossover pair"),
];

const EMA_PARAMS: &[ParamMeta] = &[
    PERIODS,
    ParamMeta::period("cross_fast", 12.0, (1.0, 1000.0, 1.0), "Fast period of the crossover pair"),
    ParamMeta::period("cross_slow", 26.0, (1.0, 1000.0, 1.0), "Slow period of the crossover pair"),
];

impl Averaging for Simple {
    const ID: &'static str = "sma";
    const CROSS_FAST: f64 = 50.0;
    const CROSS_SLOW: f64 = 200.0;
    const BULLISH: &'static str = "golden_cross";
    const BEARISH: &'static str = "death_cross";
    const PARAMS: &'static [ParamMeta] = SMA_PARAMS;

    fn average(values: &[f64], period: usize) -> Series {
        numeric::rolling_mean(values, period)
    }
}

impl Averaging for Exponential {
    const ID: &'static str = "ema";
    const CROSS_FAST: f64 = 12.0;
    const CROSS_SLOW: f64 = 26.0;
    const BULLISH: &'static str = "bullish_crossover";
    const BEARISH: &'static str = "bearish_crossover";
    const PARAMS: &'static [ParamMeta] = EMA_PARAMS;

    fn average(values: &[f64], period: usize) -> Series {
        numeric::ema(&numeric::lift(values), period)
    }
}

/// Moving average over closes, one series per configured period
#[derive(Debug, Clone)]
pub struct MovingAverageIndicator<A: Averaging> {
    periods: Vec<Period>,
    pub cross_fast: Period,
    pub cross_slow: Period,
    _family: PhantomData<A>,
}

pub type SmaIndicator = MovingAverageIndicator<Simple>;
pub type EmaIndicator = MovingAverageIndicator<Exponential>;

impl<A: Averaging> Default for MovingAverageIndicator<A> {
    fn default() -> Self {
        Self {
            periods: vec![Period::new_const(20)],
            cross_fast: Period::new_const(A::CROSS_FAST as usize),
            cross_slow: Period::new_const(A::CROSS_SLOW as usize),
            _family: PhantomData,
        }
    }
}

impl<A: Averaging> MovingAverageIndicator<A> {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn new(periods: Vec<Period>) -> Result<Self> {
        let indicator = Self {
            periods,
            ..Self::default()
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    /// Series key for one period, e.g. `sma_20`
    pub fn series_name(period: Period) -> String {
        format!("{}_{}", A::ID, period.get())
    }

    /// Configured periods, never empty
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn primary_period(&self) -> Period {
        self.periods.first().copied().unwrap_or(Period::new_const(1))
    }

    pub fn crossover(&self) -> CrossoverDetector {
        CrossoverDetector::new(
            Self::series_name(self.cross_fast),
            Self::series_name(self.cross_slow),
        )
        .with_labels(A::BULLISH, A::BEARISH)
    }

    fn crossover_series(&self, closes: &[f64]) -> IndicatorSeries {
        [self.cross_fast, self.cross_slow]
            .into_iter()
            .map(|p| (Self::series_name(p), A::average(closes, p.get())))
            .collect()
    }
}

impl<A: Averaging> Indicator for MovingAverageIndicator<A> {
    fn indicator_type(&self) -> &'static str {
        A::ID
    }

    fn minimum_periods(&self) -> usize {
        self.periods.iter().map(|p| p.get()).max().unwrap_or(1)
    }

    fn calculate_series<T: OHLCV>(&self, bars: &[T]) -> IndicatorSeries {
        let closes = closes(bars);
        let min = self.minimum_periods();
        self.periods
            .iter()
            .map(|&p| {
                let mut values = A::average(&closes, p.get());
                numeric::warm_up(&mut values, min);
                (Self::series_name(p), values)
            })
            .collect()
    }

    fn evaluate<T: OHLCV>(&self, bars: &[T], series: &IndicatorSeries) -> Evaluation {
        let primary = last_of(series, &Self::series_name(self.primary_period()));
        let close = bars.last().map(|b| b.close());

        let mut eval = Evaluation::new(primary);
        for &p in &self.periods {
            let name = Self::series_name(p);
            eval = eval.with_value(&name, last_of(series, &name));
        }

        let position = match (close, primary) {
            (Some(c), Some(ma)) if c > ma => "above",
            (Some(c), Some(ma)) if c < ma => "below",
            _ => "at",
        };
        let signal = match position {
            "above" => "bullish",
            "below" => "bearish",
            _ => "neutral",
        };

        let cross_series = self.crossover_series(&closes(bars));
        let crossover = self.crossover().classify(&cross_series);

        let periods: Vec<Value> = self.periods.iter().map(|p| p.get().into()).collect();
        eval.with_meta("signal", signal)
            .with_meta("price_position", position)
            .with_meta("periods", periods)
            .with_meta(
                "crossover_pair",
                vec![Value::from(self.cross_fast.get()), Value::from(self.cross_slow.get())],
            )
            .with_meta("crossover", crossover.map_or(Value::Null, Value::from))
    }

    fn validate_config(&self) -> Result<()> {
        if self.periods.is_empty() {
            return Err(EngineError::InvalidValue("at least one period is required"));
        }
        if self.cross_fast >= self.cross_slow {
            return Err(EngineError::InvalidValue("cross_fast must be < cross_slow"));
        }
        Ok(())
    }
}

impl<A: Averaging> ParameterizedAlgorithm for MovingAverageIndicator<A> {
    fn param_meta() -> &'static [ParamMeta] {
        A::PARAMS
    }

    fn with_params(params: &ParamSet) -> Result<Self> {
        let meta = A::PARAMS;
        let indicator = Self {
            periods: params.periods(&meta[0])?,
            cross_fast: params.period(&meta[1])?,
            cross_slow: params.period(&meta[2])?,
            _family: PhantomData,
        };
        indicator.validate_config()?;
        Ok(indicator)
    }

    fn implementation_id() -> &'static str {
        A::ID
    }
}
