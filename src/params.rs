//! Typed algorithm parameters
//!
//! Definitions carry loosely typed parameter maps (they come from TOML or any
//! other store). Each algorithm publishes a static table of [`ParamMeta`] and
//! reads its values through [`ParamSet`], which applies defaults and validates
//! ranges once, at construction time.
//!
//! # Example
//!
//! ```rust
//! use yatie::indicators::RsiIndicator;
//! use yatie::params::{ParamSet, ParamValue, ParameterizedAlgorithm};
//!
//! for param in RsiIndicator::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let params = ParamSet::new().with("period", ParamValue::Number(10.0));
//! let rsi = RsiIndicator::with_params(&params).unwrap();
//! assert_eq!(rsi.period.get(), 10);
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{EngineError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Value in 0.0..=1.0
    Ratio,
    /// Unconstrained real number (still range-checked)
    Number,
    /// Positive integer
    Period,
    /// One positive integer or a list of them
    PeriodList,
    /// Boolean switch
    Flag,
    /// One of a fixed set of names
    Choice,
}

/// Raw parameter value as stored in a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Metadata for a single algorithm parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParamMeta {
    /// Parameter name (e.g., "period")
    pub name: &'static str,
    pub param_type: ParamType,
    /// Default value (`1.0`/`0.0` for flags, index into `choices` for choices)
    pub default: f64,
    /// Accepted range: (min, max, step)
    pub range: (f64, f64, f64),
    /// Accepted names for [`ParamType::Choice`]
    pub choices: &'static [&'static str],
    pub description: &'static str,
}

impl ParamMeta {
    pub const fn ratio(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Ratio,
            default,
            range,
            choices: &[],
            description,
        }
    }

    pub const fn number(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Number,
            default,
            range,
            choices: &[],
            description,
        }
    }

    pub const fn period(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Period,
            default,
            range,
            choices: &[],
            description,
        }
    }

    pub const fn period_list(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::PeriodList,
            default,
            range,
            choices: &[],
            description,
        }
    }

    pub const fn flag(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            param_type: ParamType::Flag,
            default: if default { 1.0 } else { 0.0 },
            range: (0.0, 1.0, 1.0),
            choices: &[],
            description,
        }
    }

    /// The first entry of `choices` is the default
    pub const fn choice(
        name: &'static str,
        choices: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Choice,
            default: 0.0,
            range: (0.0, 0.0, 0.0),
            choices,
            description,
        }
    }

    /// Validate a numeric value for this parameter
    pub fn validate(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(EngineError::InvalidValue("parameter must be finite"));
        }
        let (min, max, _) = self.range;
        if value < min || value > max {
            return Err(EngineError::OutOfRange {
                field: self.name,
                value,
                min,
                max,
            });
        }
        match self.param_type {
            ParamType::Period | ParamType::PeriodList => {
                if value < 1.0 || value.fract() != 0.0 {
                    return Err(EngineError::InvalidValue("Period must be a positive integer"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn default_choice(&self) -> &'static str {
        self.choices.first().copied().unwrap_or("")
    }
}

// ============================================================
// PARAMETER SET
// ============================================================

/// Parameter values of one definition, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Number with default fallback and range check
    pub fn number(&self, meta: &ParamMeta) -> Result<f64> {
        let value = match self.0.get(meta.name) {
            None => meta.default,
            Some(ParamValue::Number(v)) => *v,
            Some(_) => return Err(EngineError::InvalidValue("expected a number")),
        };
        meta.validate(value)?;
        Ok(value)
    }

    pub fn ratio(&self, meta: &ParamMeta) -> Result<Ratio> {
        Ratio::new(self.number(meta)?)
    }

    pub fn period(&self, meta: &ParamMeta) -> Result<Period> {
        Period::new(self.number(meta)? as usize)
    }

    /// A single period or a list of periods
    pub fn periods(&self, meta: &ParamMeta) -> Result<Vec<Period>> {
        let values = match self.0.get(meta.name) {
            None => vec![meta.default],
            Some(ParamValue::Number(v)) => vec![*v],
            Some(ParamValue::List(list)) => list.clone(),
            Some(_) => return Err(EngineError::InvalidValue("expected a period or a list of periods")),
        };
        if values.is_empty() {
            return Err(EngineError::InvalidValue("period list must not be empty"));
        }
        values
            .into_iter()
            .map(|v| {
                meta.validate(v)?;
                Period::new(v as usize)
            })
            .collect()
    }

    pub fn flag(&self, meta: &ParamMeta) -> Result<bool> {
        match self.0.get(meta.name) {
            None => Ok(meta.default != 0.0),
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(ParamValue::Number(v)) if *v == 0.0 || *v == 1.0 => Ok(*v == 1.0),
            Some(_) => Err(EngineError::InvalidValue("expected a boolean")),
        }
    }

    /// Named choice parsed into its typed form
    pub fn choice<T>(&self, meta: &ParamMeta) -> Result<T>
    where
        T: FromStr<Err = EngineError>,
    {
        match self.0.get(meta.name) {
            None => meta.default_choice().parse(),
            Some(ParamValue::Text(s)) => s.parse(),
            Some(_) => Err(EngineError::InvalidValue("expected a name")),
        }
    }

    /// Keys not described by `metas`
    pub fn unknown_keys<'a>(&'a self, metas: &'a [ParamMeta]) -> impl Iterator<Item = &'a str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !metas.iter().any(|m| m.name == *k))
    }

    /// Log every key the algorithm does not understand
    pub fn warn_unknown(&self, implementation: &str, metas: &[ParamMeta]) {
        for key in self.unknown_keys(metas) {
            warn!(implementation, key, "ignoring unknown parameter");
        }
    }
}

impl FromIterator<(String, ParamValue)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamSet {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

// ============================================================
// PARAMETERIZED ALGORITHM TRAIT
// ============================================================

/// Algorithms constructed from a [`ParamSet`]
///
/// Missing parameters use their defaults; construction validates everything so
/// a built instance is always usable.
pub trait ParameterizedAlgorithm: Sized {
    /// Metadata for all configurable parameters
    fn param_meta() -> &'static [ParamMeta];

    fn with_params(params: &ParamSet) -> Result<Self>;

    /// Identifier used in definition `implementation` fields
    fn implementation_id() -> &'static str;
}

// ============================================================
// TESTS
// ============================================================
