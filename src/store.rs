//! Definition stores
//!
//! The registry reads raw [`DefinitionRecord`]s through the [`DefinitionStore`]
//! trait, once per timeframe. Records are filtered and validated by the
//! registry, not by the store.
//!
//! # TOML Format
//!
//! ```toml
//! [[indicators]]
//! name = "RSI"
//! implementation = "rsi"
//! category = "momentum"
//! min_bars_required = 15
//! timeframes = ["daily", "weekly"]
//!
//! [indicators.parameters]
//! period = 14
//!
//! [[patterns]]
//! name = "Doji"
//! implementation = "doji"
//! category = "indecision"
//! confidence_threshold = 0.7
//! ```

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    definition::{Category, DefinitionKind},
    params::{ParamSet, ParamValue},
    EngineError, Result, Timeframe,
};

// ============================================================
// RECORD
// ============================================================

/// Raw definition as held by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    /// Set from the table the record was read from
    #[serde(skip_deserializing, default = "default_kind")]
    pub kind: DefinitionKind,
    pub name: String,
    #[serde(default, alias = "implementation_id")]
    pub implementation: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub parameters: ParamSet,
    #[serde(default)]
    pub min_bars_required: Option<usize>,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Empty means every timeframe
    #[serde(default)]
    pub timeframes: Vec<Timeframe>,
    #[serde(default)]
    pub display_order: i32,
}

fn default_kind() -> DefinitionKind {
    DefinitionKind::Indicator
}

fn default_enabled() -> bool {
    true
}

impl DefinitionRecord {
    fn new(kind: DefinitionKind, name: &str, implementation: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            implementation: Some(implementation.to_string()),
            category: None,
            parameters: ParamSet::new(),
            min_bars_required: None,
            confidence_threshold: None,
            enabled: true,
            timeframes: Vec::new(),
            display_order: 0,
        }
    }

    pub fn indicator(name: &str, implementation: &str) -> Self {
        Self::new(DefinitionKind::Indicator, name, implementation)
    }

    pub fn pattern(name: &str, implementation: &str) -> Self {
        Self::new(DefinitionKind::Pattern, name, implementation)
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    pub fn with_min_bars(mut self, bars: usize) -> Self {
        self.min_bars_required = Some(bars);
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.timeframes = timeframes;
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ============================================================
// STORE TRAIT
// ============================================================

/// Source of definition records
pub trait DefinitionStore: Send + Sync {
    /// Every record that may apply to `timeframe`. Failures are reported as
    /// [`EngineError::Store`].
    fn fetch_definitions(&self, timeframe: Timeframe) -> Result<Vec<DefinitionRecord>>;
}

// ============================================================
// IN-MEMORY STORE
// ============================================================

/// Store over an in-memory record list; counts queries
#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    records: RwLock<Vec<DefinitionRecord>>,
    queries: AtomicUsize,
}

impl InMemoryDefinitionStore {
    pub fn new(records: Vec<DefinitionRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            queries: AtomicUsize::new(0),
        }
    }

    /// Swap the record set; cached registry entries stay until invalidated
    pub fn replace(&self, records: Vec<DefinitionRecord>) {
        *self.records.write() = records;
    }

    pub fn push(&self, record: DefinitionRecord) {
        self.records.write().push(record);
    }

    /// Number of `fetch_definitions` calls served
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

impl DefinitionStore for InMemoryDefinitionStore {
    fn fetch_definitions(&self, _timeframe: Timeframe) -> Result<Vec<DefinitionRecord>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.records.read().clone())
    }
}

// ============================================================
// TOML STORE
// ============================================================

/// Entries stay untyped until each one is converted on its own, so one
/// malformed entry cannot hide its siblings
#[derive(Debug, Default, Deserialize)]
struct DefinitionsFile {
    #[serde(default)]
    indicators: Vec<toml::Value>,
    #[serde(default)]
    patterns: Vec<toml::Value>,
}

/// Store backed by a TOML definitions file, re-read on every query
#[derive(Debug, Clone)]
pub struct TomlDefinitionStore {
    path: PathBuf,
}

impl TomlDefinitionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a definitions document.
    ///
    /// A document that is not valid TOML fails as a whole. A single entry that
    /// does not convert to a [`DefinitionRecord`] (unknown category or
    /// timeframe, bad parameter shape) is skipped with a warning.
    pub fn parse(text: &str) -> Result<Vec<DefinitionRecord>> {
        let file: DefinitionsFile =
            toml::from_str(text).map_err(|e| EngineError::Store(format!("invalid definitions file: {e}")))?;

        let mut records = Vec::with_capacity(file.indicators.len() + file.patterns.len());
        records.extend(convert_entries(file.indicators, DefinitionKind::Indicator));
        records.extend(convert_entries(file.patterns, DefinitionKind::Pattern));
        Ok(records)
    }
}

fn convert_entries(entries: Vec<toml::Value>, kind: DefinitionKind) -> impl Iterator<Item = DefinitionRecord> {
    entries.into_iter().enumerate().filter_map(move |(position, entry)| {
        let name = entry
            .get("name")
            .and_then(toml::Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();
        match entry.try_into::<DefinitionRecord>() {
            Ok(mut record) => {
                record.kind = kind;
                Some(record)
            }
            Err(e) => {
                warn!(%kind, position, name = %name, error = %e, "skipping malformed definition entry");
                None
            }
        }
    })
}

impl DefinitionStore for TomlDefinitionStore {
    fn fetch_definitions(&self, timeframe: Timeframe) -> Result<Vec<DefinitionRecord>> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| EngineError::Store(format!("{}: {e}", self.path.display())))?;
        let records = Self::parse(&text)?;
        tracing::debug!(path = %self.path.display(), %timeframe, count = records.len(), "read definitions file");
        Ok(records)
    }
}
