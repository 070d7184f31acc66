//! Shared rolling-window kernels.
//!
//! All kernels return one entry per input element; `None` marks "no value"
//! (a partial window or a position before the series has warmed up). Nothing
//! here ever zero-fills a partial window.
//!
//! Two smoothing families are kept apart:
//!
//! - simple rolling mean / standard deviation (unweighted)
//! - exponential smoothing, either standard EMA (`α = 2/(p+1)`) or Wilder's
//!   smoothing (`α = 1/p`)
//!
//! Exponential smoothers are seeded with the simple mean of the first `p`
//! consecutive valid inputs, so their first value appears at the same index as
//! a simple rolling mean over the same input.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result, OHLCV};

/// Numeric series with explicit "no value" entries
pub type Series = Vec<Option<f64>>;

/// Smoothing mode for Wilder-family indicators (RSI, ATR, ADX)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
    /// Exponential smoothing with `α = 1/period`
    #[default]
    Wilder,
    /// Simple moving average over `period` values
    Simple,
}

impl Smoothing {
    pub const CHOICES: &'static [&'static str] = &["wilder", "simple"];

    pub fn as_str(self) -> &'static str {
        match self {
            Smoothing::Wilder => "wilder",
            Smoothing::Simple => "simple",
        }
    }
}

impl std::str::FromStr for Smoothing {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wilder" | "wilders" | "rma" => Ok(Smoothing::Wilder),
            "simple" | "sma" => Ok(Smoothing::Simple),
            _ => Err(EngineError::InvalidValue("smoothing must be 'wilder' or 'simple'")),
        }
    }
}

/// Wrap every value as present
#[inline]
pub fn lift(values: &[f64]) -> Series {
    values.iter().copied().map(Some).collect()
}

/// Last entry of a series, if it holds a value
#[inline]
pub fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Second-to-last entry of a series, if it holds a value
#[inline]
pub fn previous_value(series: &[Option<f64>]) -> Option<f64> {
    series.len().checked_sub(2).and_then(|i| series[i])
}

/// `num / den`, or `sentinel` when the denominator is zero
#[inline]
pub fn ratio_or(num: f64, den: f64, sentinel: f64) -> f64 {
    if den.abs() <= f64::EPSILON {
        sentinel
    } else {
        num / den
    }
}

/// Clear every entry before index `min_periods - 1`.
pub fn warm_up(series: &mut [Option<f64>], min_periods: usize) {
    let cut = min_periods.saturating_sub(1).min(series.len());
    series[..cut].iter_mut().for_each(|v| *v = None);
}

/// Full-window window slice ending at `i`, only when every entry is present.
fn full_window(values: &[Option<f64>], i: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || i + 1 < window {
        return None;
    }
    values[i + 1 - window..=i].iter().copied().collect()
}

/// Simple rolling mean over a full window
pub fn rolling_mean(values: &[f64], window: usize) -> Series {
    rolling_mean_opt(&lift(values), window)
}

/// Simple rolling mean where any missing input inside the window yields `None`
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Series {
    (0..values.len())
        .map(|i| {
            full_window(values, i, window).map(|w| w.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Rolling population standard deviation (ddof = 0) over a full window
pub fn rolling_std(values: &[f64], window: usize) -> Series {
    let values = lift(values);
    (0..values.len())
        .map(|i| {
            full_window(&values, i, window).map(|w| {
                let mean = w.iter().sum::<f64>() / window as f64;
                let var = w.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / window as f64;
                var.max(0.0).sqrt()
            })
        })
        .collect()
}

/// Exponential smoothing with an explicit weight.
///
/// Seeds with the mean of the first `period` consecutive valid inputs. A
/// missing input after seeding produces no value and leaves the state untouched.
pub fn exponential(values: &[Option<f64>], period: usize, alpha: f64) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut state: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;

    for (i, value) in values.iter().enumerate() {
        match (state, *value) {
            (Some(prev), Some(x)) => {
                let next = alpha * x + (1.0 - alpha) * prev;
                state = Some(next);
                out[i] = Some(next);
            }
            (Some(_), None) => {}
            (None, Some(x)) => {
                seed_sum += x;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    state = Some(seed);
                    out[i] = Some(seed);
                }
            }
            (None, None) => {
                seed_sum = 0.0;
                seed_count = 0;
            }
        }
    }

    out
}

/// Standard EMA, `α = 2/(period+1)`
pub fn ema(values: &[Option<f64>], period: usize) -> Series {
    exponential(values, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder's smoothing, `α = 1/period`
pub fn wilder(values: &[Option<f64>], period: usize) -> Series {
    if period == 0 {
        return vec![None; values.len()];
    }
    exponential(values, period, 1.0 / period as f64)
}

/// Smooth with the selected family
pub fn smooth(values: &[Option<f64>], period: usize, smoothing: Smoothing) -> Series {
    match smoothing {
        Smoothing::Wilder => wilder(values, period),
        Smoothing::Simple => rolling_mean_opt(values, period),
    }
}

fn rolling_extreme(values: &[f64], window: usize, keep: impl Fn(f64, f64) -> bool) -> Series {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    // indices whose values are monotonic under `keep`
    let mut deque: VecDeque<usize> = VecDeque::with_capacity(window);

    for (i, &x) in values.iter().enumerate() {
        while deque.back().is_some_and(|&j| !keep(values[j], x)) {
            deque.pop_back();
        }
        deque.push_back(i);
        if deque.front().is_some_and(|&j| j + window <= i) {
            deque.pop_front();
        }
        if i + 1 >= window {
            out[i] = deque.front().map(|&j| values[j]);
        }
    }

    out
}

/// Rolling maximum over a full window (monotonic deque, O(n))
pub fn rolling_max(values: &[f64], window: usize) -> Series {
    rolling_extreme(values, window, |kept, new| kept > new)
}

/// Rolling minimum over a full window (monotonic deque, O(n))
pub fn rolling_min(values: &[f64], window: usize) -> Series {
    rolling_extreme(values, window, |kept, new| kept < new)
}

/// True Range per bar.
///
/// `max(high−low, |high−prev_close|, |low−prev_close|)`; the first bar has
/// no previous close and uses `high − low`.
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high() - bar.low();
            if i == 0 {
                return hl;
            }
            let prev_close = bars[i - 1].close();
            hl.max((bar.high() - prev_close).abs())
                .max((bar.low() - prev_close).abs())
        })
        .collect()
}

/// Mean of the trailing `window` entries ending at the last element.
///
/// Returns `None` unless all `window` entries hold a value.
pub fn trailing_mean(series: &[Option<f64>], window: usize) -> Option<f64> {
    let end = series.len().checked_sub(1)?;
    full_window(series, end, window).map(|w| w.iter().sum::<f64>() / window as f64)
}
