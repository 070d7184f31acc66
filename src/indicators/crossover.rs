//! Crossover between two named series.
//!
//! A crossover compares the relative ordering of a fast and a slow series on
//! the previous bar and the current bar. Indicators that report crossovers
//! (moving averages, MACD, Stochastic) name both series explicitly instead of
//! inferring the pairing from whatever happens to be computed.

use serde::Serialize;

use crate::result::IndicatorSeries;

/// Direction of a crossover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cross {
    /// Fast series moved from at-or-below to above the slow series
    Bullish,
    /// Fast series moved from at-or-above to below the slow series
    Bearish,
}

/// Detect a crossover at the last bar of two aligned series.
///
/// Needs values on both the previous and the current bar.
pub fn cross(fast: &[Option<f64>], slow: &[Option<f64>]) -> Option<Cross> {
    let n = fast.len().min(slow.len());
    if n < 2 {
        return None;
    }
    let prev = fast[n - 2]? - slow[n - 2]?;
    let curr = fast[n - 1]? - slow[n - 1]?;

    if prev <= 0.0 && curr > 0.0 {
        Some(Cross::Bullish)
    } else if prev >= 0.0 && curr < 0.0 {
        Some(Cross::Bearish)
    } else {
        None
    }
}

/// Crossover contract between two named series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossoverDetector {
    pub fast: String,
    pub slow: String,
    pub bullish_label: &'static str,
    pub bearish_label: &'static str,
}

impl CrossoverDetector {
    pub fn new(fast: impl Into<String>, slow: impl Into<String>) -> Self {
        Self {
            fast: fast.into(),
            slow: slow.into(),
            bullish_label: "bullish_crossover",
            bearish_label: "bearish_crossover",
        }
    }

    pub fn with_labels(mut self, bullish: &'static str, bearish: &'static str) -> Self {
        self.bullish_label = bullish;
        self.bearish_label = bearish;
        self
    }

    /// Crossover at the last bar; `None` if either series is missing
    pub fn detect(&self, series: &IndicatorSeries) -> Option<Cross> {
        cross(series.get(&self.fast)?, series.get(&self.slow)?)
    }

    pub fn label(&self, cross: Cross) -> &'static str {
        match cross {
            Cross::Bullish => self.bullish_label,
            Cross::Bearish => self.bearish_label,
        }
    }

    /// Label of the crossover at the last bar, if one occurred
    pub fn classify(&self, series: &IndicatorSeries) -> Option<&'static str> {
        self.detect(series).map(|c| self.label(c))
    }
}
