//! Capability loader
//!
//! Turns a [`Definition`] into a validated algorithm instance. Implementation
//! identifiers are resolved through a table fixed at compile time; there is no
//! dynamic lookup and no fallback for unknown identifiers.
//!
//! Constructed instances are cached per `(timeframe, name)` and shared as
//! `Arc`. A cached instance is only handed out while the registry still returns
//! the same definition it was built from, so invalidating the registry forces
//! reconstruction on the next load.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    definition::{Definition, DefinitionKind},
    detectors::{
        BuiltinDetector, DojiDetector, EngulfingDetector, EveningStarDetector, HammerDetector,
        HangingManDetector, HaramiDetector, MorningStarDetector, ShootingStarDetector,
    },
    indicators::{
        AdxIndicator, AtrIndicator, BollingerBandsIndicator, BuiltinIndicator, EmaIndicator,
        MacdIndicator, RsiIndicator, SmaIndicator, StochasticIndicator,
    },
    params::{ParamMeta, ParamSet, ParameterizedAlgorithm},
    registry::{normalize, DefinitionRegistry},
    EngineError, Result, Timeframe,
};

// ============================================================
// ALGORITHM
// ============================================================

/// A constructed, validated algorithm
#[derive(Debug, Clone)]
pub enum Algorithm {
    Indicator(BuiltinIndicator),
    Pattern(BuiltinDetector),
}

impl Algorithm {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Algorithm::Indicator(_) => DefinitionKind::Indicator,
            Algorithm::Pattern(_) => DefinitionKind::Pattern,
        }
    }

    /// Bars the algorithm itself needs
    pub fn min_bars(&self) -> usize {
        match self {
            Algorithm::Indicator(i) => i.minimum_periods(),
            Algorithm::Pattern(p) => p.min_bars(),
        }
    }

    pub fn as_indicator(&self) -> Option<&BuiltinIndicator> {
        match self {
            Algorithm::Indicator(i) => Some(i),
            Algorithm::Pattern(_) => None,
        }
    }

    pub fn as_pattern(&self) -> Option<&BuiltinDetector> {
        match self {
            Algorithm::Pattern(p) => Some(p),
            Algorithm::Indicator(_) => None,
        }
    }
}

/// An algorithm together with the definition it was built from
#[derive(Debug, Clone)]
pub struct ResolvedAlgorithm {
    pub definition: Definition,
    pub algorithm: Algorithm,
}

impl ResolvedAlgorithm {
    /// The stricter of the definition's and the algorithm's own minimum
    pub fn min_bars_required(&self) -> usize {
        self.definition.min_bars_required().max(self.algorithm.min_bars())
    }
}

// ============================================================
// IMPLEMENTATION TABLE
// ============================================================

/// Generate the id -> constructor table
macro_rules! implementation_table {
    (
        $($id:literal => $kind:ident($algorithm:ty)),* $(,)?
    ) => {
        /// Identifiers of every known implementation
        pub fn implementation_ids() -> &'static [&'static str] {
            &[$($id),*]
        }

        /// Parameter metadata of an implementation
        pub fn param_meta(id: &str) -> Option<&'static [ParamMeta]> {
            match id {
                $($id => Some(<$algorithm as ParameterizedAlgorithm>::param_meta()),)*
                _ => None,
            }
        }

        fn construct(id: &str, params: &ParamSet) -> Option<Result<Algorithm>> {
            match id {
                $($id => Some(
                    <$algorithm as ParameterizedAlgorithm>::with_params(params)
                        .map(|a| Algorithm::$kind(a.into())),
                ),)*
                _ => None,
            }
        }

        #[cfg(test)]
        fn declared_ids() -> Vec<(&'static str, &'static str)> {
            vec![$(($id, <$algorithm as ParameterizedAlgorithm>::implementation_id())),*]
        }
    };
}

implementation_table! {
    // Indicators
    "sma" => Indicator(SmaIndicator),
    "ema" => Indicator(EmaIndicator),
    "rsi" => Indicator(RsiIndicator),
    "macd" => Indicator(MacdIndicator),
    "atr" => Indicator(AtrIndicator),
    "adx" => Indicator(AdxIndicator),
    "bollinger_bands" => Indicator(BollingerBandsIndicator),
    "stochastic" => Indicator(StochasticIndicator),

    // Patterns
    "doji" => Pattern(DojiDetector),
    "hammer" => Pattern(HammerDetector),
    "hanging_man" => Pattern(HangingManDetector),
    "shooting_star" => Pattern(ShootingStarDetector),
    "engulfing" => Pattern(EngulfingDetector),
    "harami" => Pattern(HaramiDetector),
    "morning_star" => Pattern(MorningStarDetector),
    "evening_star" => Pattern(EveningStarDetector),
}

// ============================================================
// LOADER
// ============================================================

type CacheKey = (Timeframe, String);

/// Resolves definitions to algorithm instances and caches them
pub struct CapabilityLoader {
    registry: Arc<DefinitionRegistry>,
    cache: RwLock<HashMap<CacheKey, Arc<ResolvedAlgorithm>>>,
}

impl std::fmt::Debug for CapabilityLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityLoader")
            .field("registry", &self.registry)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl CapabilityLoader {
    pub fn new(registry: Arc<DefinitionRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    /// Construct the algorithm a definition names.
    ///
    /// Parameters are validated here; keys the implementation does not know
    /// are logged and ignored.
    pub fn resolve(definition: &Definition) -> Result<Algorithm> {
        let id = definition.implementation_id();
        let algorithm = construct(id, definition.parameters())
            .ok_or_else(|| EngineError::UnknownImplementation(id.to_string()))?
            .map_err(|e| e.for_implementation(id))?;

        if algorithm.kind() != definition.kind() {
            warn!(
                name = definition.name(),
                implementation = id,
                "implementation kind does not match definition kind"
            );
            return Err(EngineError::UnknownImplementation(format!(
                "{id} is not a {} implementation",
                definition.kind()
            )));
        }
        if let Some(metas) = param_meta(id) {
            definition.parameters().warn_unknown(id, metas);
        }
        Ok(algorithm)
    }

    /// Resolved algorithm for a named definition, constructed at most once per
    /// loaded definition
    pub fn load(&self, timeframe: Timeframe, name: &str) -> Result<Arc<ResolvedAlgorithm>> {
        let definition = self.registry.require(timeframe, name)?;
        let key = (timeframe, normalize(name));

        if let Some(hit) = self.cache.read().get(&key) {
            if hit.definition.ptr_eq(&definition) {
                debug!(%timeframe, name, "algorithm cache hit");
                return Ok(Arc::clone(hit));
            }
        }

        debug!(
            %timeframe,
            name,
            implementation = definition.implementation_id(),
            "constructing algorithm"
        );
        let algorithm = Self::resolve(&definition)?;
        let resolved = Arc::new(ResolvedAlgorithm { definition, algorithm });

        let mut cache = self.cache.write();
        // a concurrent load of the same definition wins
        if let Some(existing) = cache.get(&key) {
            if existing.definition.ptr_eq(&resolved.definition) {
                return Ok(Arc::clone(existing));
            }
        }
        cache.insert(key, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Drop cached instances of one timeframe
    pub fn clear(&self, timeframe: Timeframe) {
        self.cache.write().retain(|(tf, _), _| *tf != timeframe);
    }

    pub fn clear_all(&self) {
        self.cache.write().clear();
    }

    /// Number of cached instances
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DefinitionRecord, InMemoryDefinitionStore};

    fn loader(records: Vec<DefinitionRecord>) -> CapabilityLoader {
        let store = Arc::new(InMemoryDefinitionStore::new(records));
        CapabilityLoader::new(Arc::new(DefinitionRegistry::new(store)))
    }

    #[test]
    fn test_table_ids_match_algorithms() {
        for (declared, actual) in declared_ids() {
            assert_eq!(declared, actual);
        }
        assert_eq!(implementation_ids().len(), 16);
    }

    #[test]
    fn test_every_implementation_builds_with_defaults() {
        for id in implementation_ids() {
            let algorithm = construct(id, &ParamSet::new()).unwrap().unwrap();
            assert!(algorithm.min_bars() >= 1, "{id}");
            assert!(param_meta(id).is_some());
        }
    }

    #[test]
    fn test_load_returns_cached_instance() {
        let l = loader(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        let a = l.load(Timeframe::Daily, "RSI").unwrap();
        let b = l.load(Timeframe::Daily, "rsi").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(l.cached(), 1);
    }

    #[test]
    fn test_invalidation_forces_reconstruction() {
        let l = loader(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        let a = l.load(Timeframe::Daily, "rsi").unwrap();
        l.registry().invalidate(Timeframe::Daily);
        let b = l.load(Timeframe::Daily, "rsi").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        let c = l.load(Timeframe::Daily, "rsi").unwrap();
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[test]
    fn test_unknown_implementation() {
        let l = loader(vec![DefinitionRecord::indicator("Ichimoku", "ichimoku")]);
        let err = l.load(Timeframe::Daily, "ichimoku").unwrap_err();
        assert_eq!(err, EngineError::UnknownImplementation("ichimoku".to_string()));
        assert_eq!(l.cached(), 0);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let l = loader(vec![DefinitionRecord::indicator("Doji", "doji")]);
        assert!(matches!(
            l.load(Timeframe::Daily, "doji"),
            Err(EngineError::UnknownImplementation(_))
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let l = loader(vec![
            DefinitionRecord::indicator("MACD", "macd")
                .with_param("fast_period", 30.0)
                .with_param("slow_period", 10.0),
            DefinitionRecord::indicator("RSI", "rsi").with_param("period", "fourteen"),
        ]);
        for name in ["macd", "rsi"] {
            match l.load(Timeframe::Daily, name) {
                Err(EngineError::InvalidParameters { id, .. }) => assert_eq!(id, name),
                other => panic!("expected InvalidParameters, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parameters_reach_the_algorithm() {
        let l = loader(vec![DefinitionRecord::indicator("RSI", "rsi").with_param("period", 7.0)]);
        let resolved = l.load(Timeframe::Daily, "rsi").unwrap();
        match resolved.algorithm.as_indicator() {
            Some(BuiltinIndicator::Rsi(rsi)) => assert_eq!(rsi.period.get(), 7),
            other => panic!("unexpected algorithm {other:?}"),
        }
        assert_eq!(resolved.min_bars_required(), 8);
    }

    #[test]
    fn test_clear() {
        let l = loader(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        l.load(Timeframe::Daily, "rsi").unwrap();
        l.load(Timeframe::Weekly, "rsi").unwrap();
        l.clear(Timeframe::Daily);
        assert_eq!(l.cached(), 1);
        l.clear_all();
        assert_eq!(l.cached(), 0);
    }
}
