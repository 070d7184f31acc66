//! # YATIE - Yet Another Technical Indicator Engine
//!
//! Registry-driven technical indicator and candlestick pattern calculation.
//!
//! Indicator and pattern *definitions* (name, implementation id, parameters,
//! minimum bars, confidence threshold) live in an external store. The
//! [`registry::DefinitionRegistry`] loads them per timeframe, the
//! [`loader::CapabilityLoader`] turns a definition into a validated algorithm
//! instance through a compile-time implementation table, and the
//! [`orchestrator::AnalysisOrchestrator`] runs a batch of named algorithms over
//! one bar series. Unknown names are hard errors: nothing is ever substituted.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use yatie::prelude::*;
//!
//! let store = InMemoryDefinitionStore::new(vec![
//!     DefinitionRecord::indicator("RSI", "rsi").with_min_bars(15),
//!     DefinitionRecord::pattern("Doji", "doji").with_confidence_threshold(0.5),
//! ]);
//! let registry = Arc::new(DefinitionRegistry::new(Arc::new(store)));
//! let orchestrator = AnalysisOrchestrator::new(registry);
//!
//! let bars: Vec<Bar> = (0..40)
//!     .map(|i| {
//!         let c = 100.0 + i as f64;
//!         Bar::from_millis(i * 60_000, c - 0.5, c + 1.0, c - 1.0, c, 1_000)
//!     })
//!     .collect();
//! let series = BarSeries::new("AAPL", bars).unwrap();
//!
//! let batch = orchestrator.analyze(&series, "daily", &["rsi", "doji"]).unwrap();
//! assert_eq!(batch.len(), 2);
//! ```

/// Generate `with_defaults()` -> `Self::default()` for multiple algorithm types.
macro_rules! impl_with_defaults {
    ($($algorithm:ty),* $(,)?) => {
        $(impl $algorithm {
            pub fn with_defaults() -> Self { Self::default() }
        })*
    };
}

pub mod config;
pub mod definition;
pub mod detectors;
pub mod indicators;
pub mod loader;
pub mod numeric;
pub mod orchestrator;
pub mod params;
pub mod registry;
pub mod result;
pub mod series;
pub mod store;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::EngineConfig,
        // Definitions
        definition::{Category, Definition, DefinitionKind, IndicatorDefinition, PatternDefinition},
        // Detectors
        detectors::{filter_by_confidence, BuiltinDetector, PatternDetector},
        // Indicators
        indicators::{BuiltinIndicator, CrossoverDetector, Indicator},
        // Loader
        loader::{Algorithm, CapabilityLoader, ResolvedAlgorithm},
        // Orchestrator
        orchestrator::{AnalysisOrchestrator, BatchResult, ItemFailure, ItemOutcome},
        // Parameters
        params::{ParamMeta, ParamSet, ParamType, ParamValue, ParameterizedAlgorithm},
        // Registry
        registry::DefinitionRegistry,
        // Results
        result::{IndicatorResult, IndicatorSeries, PatternDetectionResult, ResultStatus},
        // Input data
        series::{Bar, BarSeries},
        // Stores
        store::{DefinitionRecord, DefinitionStore, InMemoryDefinitionStore, TomlDefinitionStore},
        // Core types
        Direction,
        EngineError,
        ErrorKind,
        OHLCVExt,
        PatternId,
        PatternMatch,
        Period,
        Ratio,
        Result,
        Timeframe,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown definition '{name}' for timeframe {timeframe}")]
    UnknownDefinition { name: String, timeframe: Timeframe },

    #[error("Unknown implementation: {0}")]
    UnknownImplementation(String),

    #[error("Invalid parameters for {id}: {reason}")]
    InvalidParameters { id: String, reason: String },

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid data format: {0}")]
    InvalidDataFormat(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Calculation failure: {0}")]
    CalculationFailure(String),

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Definition store failure: {0}")]
    Store(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Coarse classification of an [`EngineError`], reported in batch results
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownDefinition,
    UnknownImplementation,
    InvalidParameters,
    InsufficientData,
    InvalidDataFormat,
    CalculationFailure,
    InvalidTimeframe,
    Store,
    Config,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownDefinition { .. } => ErrorKind::UnknownDefinition,
            EngineError::UnknownImplementation(_) => ErrorKind::UnknownImplementation,
            EngineError::InvalidParameters { .. }
            | EngineError::InvalidValue(_)
            | EngineError::OutOfRange { .. } => ErrorKind::InvalidParameters,
            EngineError::InsufficientData { .. } => ErrorKind::InsufficientData,
            EngineError::InvalidDataFormat(_) | EngineError::InvalidOHLCV { .. } => {
                ErrorKind::InvalidDataFormat
            }
            EngineError::CalculationFailure(_) => ErrorKind::CalculationFailure,
            EngineError::InvalidTimeframe(_) => ErrorKind::InvalidTimeframe,
            EngineError::Store(_) => ErrorKind::Store,
            EngineError::Config(_) => ErrorKind::Config,
        }
    }

    /// Attach an implementation id to a bare validation error.
    pub(crate) fn for_implementation(self, id: &str) -> Self {
        match self {
            EngineError::InvalidValue(_) | EngineError::OutOfRange { .. } => {
                EngineError::InvalidParameters {
                    id: id.to_string(),
                    reason: self.to_string(),
                }
            }
            other => other,
        }
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(EngineError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(EngineError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// TIMEFRAME
// ============================================================

/// The closed timeframe vocabulary definitions are scoped by
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "intraday")]
    Intraday,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::OneMinute,
        Timeframe::Intraday,
        Timeframe::Hourly,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1min",
            Timeframe::Intraday => "intraday",
            Timeframe::Hourly => "hourly",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    /// Stable slot index, used by per-timeframe caches
    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == normalized)
            .ok_or_else(|| EngineError::InvalidTimeframe(s.to_string()))
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (**self).timestamp()
    }
}

/// Extension trait with computed candle geometry
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn body_top(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn body_bottom(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn body_midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.body_top()
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.body_bottom() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range is ~0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    #[inline]
    fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_shadow() / range)
    }

    #[inline]
    fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_shadow() / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if prices.iter().any(|p| *p < 0.0) || self.volume() < 0.0 {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "negative value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.body_bottom() < self.low() || self.body_top() > self.high() {
            return Err(EngineError::InvalidOHLCV {
                index: 0,
                reason: "open/close outside high-low range",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// Validate every bar, reporting the first offending index
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    if bars.is_empty() {
        return Err(EngineError::InvalidDataFormat("empty bar series".to_string()));
    }
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            EngineError::InvalidOHLCV { reason, .. } => EngineError::InvalidOHLCV { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// PATTERN MATCH
// ============================================================

/// Unique identifier for a pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PatternId(pub &'static str);

impl PatternId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Returns the typical/expected direction of this pattern.
    ///
    /// `None` means the pattern is bidirectional and the direction of each
    /// match depends on the candles involved.
    pub fn typical_direction(&self) -> Option<Direction> {
        match self.0 {
            "HAMMER" | "MORNING_STAR" => Some(Direction::Bullish),
            "HANGING_MAN" | "SHOOTING_STAR" | "EVENING_STAR" => Some(Direction::Bearish),
            "DOJI" => Some(Direction::Neutral),
            "ENGULFING" | "HARAMI" => None,
            _ => None,
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        self.typical_direction().is_none()
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Direction/bias of a pattern or signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// A single firing of a pattern detector
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PatternMatch {
    pub pattern_id: PatternId,
    pub direction: Direction,
    pub start_index: usize,
    pub end_index: usize,
    /// Sub-classification, e.g. the doji family member
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<&'static str>,
}

// ============================================================
// TESTS
// ============================================================
