//! Indicator and pattern definitions
//!
//! A definition is the immutable, validated form of a store record: it names
//! an algorithm implementation, carries its typed parameters, and scopes it to
//! a set of timeframes. Definitions are shared as `Arc` between the registry,
//! the loader cache and callers.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{params::ParamSet, store::DefinitionRecord, EngineError, Result, Timeframe};

/// What a definition computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Indicator,
    Pattern,
}

impl DefinitionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DefinitionKind::Indicator => "indicator",
            DefinitionKind::Pattern => "pattern",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition category
///
/// The first five apply to indicators, the last three to patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Trend,
    Momentum,
    Volatility,
    Volume,
    Directional,
    Reversal,
    Continuation,
    Indecision,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Trend => "trend",
            Category::Momentum => "momentum",
            Category::Volatility => "volatility",
            Category::Volume => "volume",
            Category::Directional => "directional",
            Category::Reversal => "reversal",
            Category::Continuation => "continuation",
            Category::Indecision => "indecision",
        }
    }

    /// Kind of definition this category belongs to
    pub fn kind(self) -> DefinitionKind {
        match self {
            Category::Trend
            | Category::Momentum
            | Category::Volatility
            | Category::Volume
            | Category::Directional => DefinitionKind::Indicator,
            Category::Reversal | Category::Continuation | Category::Indecision => {
                DefinitionKind::Pattern
            }
        }
    }

    /// Category assumed when a record omits one
    pub fn default_for(kind: DefinitionKind) -> Self {
        match kind {
            DefinitionKind::Indicator => Category::Trend,
            DefinitionKind::Pattern => Category::Reversal,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// DEFINITIONS
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorDefinition {
    pub name: String,
    pub implementation_id: String,
    pub category: Category,
    pub parameters: ParamSet,
    pub min_bars_required: usize,
    pub display_order: i32,
    /// Empty means every timeframe
    pub timeframes: Vec<Timeframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternDefinition {
    pub name: String,
    pub implementation_id: String,
    pub category: Category,
    pub parameters: ParamSet,
    pub min_bars_required: usize,
    pub display_order: i32,
    /// Firings scored below this are dropped, in `[0, 1]`
    pub confidence_threshold: Option<f64>,
    /// Empty means every timeframe
    pub timeframes: Vec<Timeframe>,
}

/// A loaded definition, cheap to clone
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    Indicator(Arc<IndicatorDefinition>),
    Pattern(Arc<PatternDefinition>),
}

macro_rules! shared_field {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $field(&self) -> $ty {
                match self {
                    Definition::Indicator(d) => &d.$field,
                    Definition::Pattern(d) => &d.$field,
                }
            }
        )*
    };
}

impl Definition {
    shared_field! {
        name: &str,
        implementation_id: &str,
        parameters: &ParamSet,
        timeframes: &[Timeframe],
    }

    pub fn kind(&self) -> DefinitionKind {
        match self {
            Definition::Indicator(_) => DefinitionKind::Indicator,
            Definition::Pattern(_) => DefinitionKind::Pattern,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Definition::Indicator(d) => d.category,
            Definition::Pattern(d) => d.category,
        }
    }

    pub fn min_bars_required(&self) -> usize {
        match self {
            Definition::Indicator(d) => d.min_bars_required,
            Definition::Pattern(d) => d.min_bars_required,
        }
    }

    pub fn display_order(&self) -> i32 {
        match self {
            Definition::Indicator(d) => d.display_order,
            Definition::Pattern(d) => d.display_order,
        }
    }

    /// Always `None` for indicators
    pub fn confidence_threshold(&self) -> Option<f64> {
        match self {
            Definition::Indicator(_) => None,
            Definition::Pattern(d) => d.confidence_threshold,
        }
    }

    /// Empty timeframe set applies everywhere
    pub fn applies_to(&self, timeframe: Timeframe) -> bool {
        let timeframes = self.timeframes();
        timeframes.is_empty() || timeframes.contains(&timeframe)
    }

    /// Both handles point at the same loaded definition
    pub fn ptr_eq(&self, other: &Definition) -> bool {
        match (self, other) {
            (Definition::Indicator(a), Definition::Indicator(b)) => Arc::ptr_eq(a, b),
            (Definition::Pattern(a), Definition::Pattern(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl TryFrom<DefinitionRecord> for Definition {
    type Error = EngineError;

    /// Validate a raw record. Missing implementation ids, blank names, a
    /// category of the wrong kind and thresholds outside `[0, 1]` are rejected.
    fn try_from(record: DefinitionRecord) -> Result<Self> {
        let malformed = |reason: &str| EngineError::Store(format!("definition '{}': {}", record.name, reason));

        let name = record.name.trim();
        if name.is_empty() {
            return Err(malformed("blank name"));
        }
        let implementation_id = match record.implementation.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_ascii_lowercase(),
            _ => return Err(malformed("missing implementation identifier")),
        };
        let category = record.category.unwrap_or_else(|| Category::default_for(record.kind));
        if category.kind() != record.kind {
            return Err(malformed("category does not match definition kind"));
        }
        let min_bars_required = record.min_bars_required.unwrap_or(1).max(1);

        match record.kind {
            DefinitionKind::Indicator => {
                if record.confidence_threshold.is_some() {
                    tracing::warn!(name, "confidence_threshold ignored on indicator definition");
                }
                Ok(Definition::Indicator(Arc::new(IndicatorDefinition {
                    name: name.to_string(),
                    implementation_id,
                    category,
                    parameters: record.parameters,
                    min_bars_required,
                    display_order: record.display_order,
                    timeframes: record.timeframes,
                })))
            }
            DefinitionKind::Pattern => {
                if let Some(t) = record.confidence_threshold {
                    if !(0.0..=1.0).contains(&t) {
                        return Err(malformed("confidence_threshold outside [0, 1]"));
                    }
                }
                Ok(Definition::Pattern(Arc::new(PatternDefinition {
                    name: name.to_string(),
                    implementation_id,
                    category,
                    parameters: record.parameters,
                    min_bars_required,
                    display_order: record.display_order,
                    confidence_threshold: record.confidence_threshold,
                    timeframes: record.timeframes,
                })))
            }
        }
    }
}
