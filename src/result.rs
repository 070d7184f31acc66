//! Result value objects handed to callers.
//!
//! Results are produced fresh per call and never persisted by the engine.
//! A failed calculation is still a result: `status` says why it is empty.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::PatternMatch;

/// Named indicator series, each aligned 1:1 with the input bars
pub type IndicatorSeries = IndexMap<String, Vec<Option<f64>>>;

/// Outcome classification of one calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    InsufficientData { need: usize, got: usize },
    InvalidTimeframe,
    InvalidData,
    CalculationFailure,
}

impl ResultStatus {
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, ResultStatus::Ok)
    }
}

/// Output of one indicator over one bar series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub indicator_type: String,
    pub symbol: String,
    pub timeframe: String,
    /// Primary scalar at the last bar
    pub value: Option<f64>,
    /// Named sub-values at the last bar, e.g. `macd`, `signal`, `histogram`
    pub value_data: IndexMap<String, f64>,
    pub calculation_timestamp: DateTime<Utc>,
    /// Signal classification, thresholds in use, error reason
    pub metadata: Map<String, Value>,
    pub status: ResultStatus,
}

impl IndicatorResult {
    /// A result with no value, carrying the reason in `metadata.error`
    pub fn empty(
        indicator_type: &str,
        symbol: &str,
        timeframe: &str,
        status: ResultStatus,
        reason: impl Into<String>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::String(reason.into()));
        Self {
            indicator_type: indicator_type.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            value: None,
            value_data: IndexMap::new(),
            calculation_timestamp: Utc::now(),
            metadata,
            status,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Named sub-value
    pub fn get(&self, key: &str) -> Option<f64> {
        self.value_data.get(key).copied()
    }

    /// String metadata entry, e.g. `signal`
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }

    pub fn meta_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    pub fn signal(&self) -> Option<&str> {
        self.meta_str("signal")
    }

    pub fn error(&self) -> Option<&str> {
        self.meta_str("error")
    }
}

/// Output of one pattern detector over one bar series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternDetectionResult {
    pub pattern: String,
    pub symbol: String,
    pub timeframe: String,
    /// One flag per input bar
    pub detections: Vec<bool>,
    /// Confidence per firing index, when the detector scores confidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<BTreeMap<usize, f64>>,
    /// Details of every firing that survived filtering
    pub matches: Vec<PatternMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    pub calculation_timestamp: DateTime<Utc>,
    pub status: ResultStatus,
}

impl PatternDetectionResult {
    /// An all-false result of length `len`
    pub fn empty(pattern: &str, symbol: &str, timeframe: &str, len: usize, status: ResultStatus) -> Self {
        Self {
            pattern: pattern.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            detections: vec![false; len],
            confidence: None,
            matches: Vec::new(),
            confidence_threshold: None,
            calculation_timestamp: Utc::now(),
            status,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn detection_count(&self) -> usize {
        self.detections.iter().filter(|d| **d).count()
    }

    pub fn fired_indices(&self) -> Vec<usize> {
        self.detections
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.then_some(i))
            .collect()
    }

    /// Confidence at a firing index
    pub fn confidence_at(&self, index: usize) -> Option<f64> {
        self.confidence.as_ref().and_then(|c| c.get(&index).copied())
    }
}
