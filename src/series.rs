//! Input data model: a single OHLCV [`Bar`] and the validated, immutable
//! [`BarSeries`] that algorithms borrow read-only.

use std::ops::Deref;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{validate_bars, EngineError, Result, OHLCV};

/// One OHLCV sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time (UTC)
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Build a bar from a unix timestamp in milliseconds.
    ///
    /// Out-of-range timestamps clamp to the unix epoch.
    pub fn from_millis(millis: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default();
        Self::new(timestamp, open, high, low, close, volume)
    }
}

impl OHLCV for Bar {
    #[inline]
    fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    fn close(&self) -> f64 {
        self.close
    }

    #[inline]
    fn volume(&self) -> f64 {
        self.volume as f64
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp.timestamp_millis())
    }
}

/// An ordered, immutable sequence of bars for one symbol.
///
/// Construction validates every bar (finite, non-negative, OHLC-consistent)
/// and requires strictly ascending timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self> {
        validate_bars(&bars)?;
        if let Some(i) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(EngineError::InvalidDataFormat(format!(
                "timestamps must be strictly ascending (index {})",
                i + 1
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first_timestamp(&self) -> DateTime<Utc> {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.bars[self.bars.len() - 1].timestamp
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl Deref for BarSeries {
    type Target = [Bar];

    fn deref(&self) -> &[Bar] {
        &self.bars
    }
}

impl AsRef<[Bar]> for BarSeries {
    fn as_ref(&self) -> &[Bar] {
        &self.bars
    }
}

/// Close prices of a bar slice
pub fn closes<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(|b| b.close()).collect()
}

/// High prices of a bar slice
pub fn highs<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(|b| b.high()).collect()
}

/// Low prices of a bar slice
pub fn lows<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(|b| b.low()).collect()
}
