//! Definition registry
//!
//! Maps names to definitions per timeframe. Each timeframe owns one cache slot
//! behind its own lock, so loading one timeframe never blocks readers of
//! another. A slot is filled by a single store query and stays until
//! invalidated.
//!
//! Lookups are case-insensitive. A name that is not defined for a timeframe is
//! an error: nothing is ever substituted for it.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    definition::Definition,
    store::{DefinitionRecord, DefinitionStore},
    EngineError, Result, Timeframe,
};

/// Definitions of one timeframe keyed by lowercase name, in display order
pub type DefinitionMap = IndexMap<String, Definition>;

type Slot = RwLock<Option<Arc<DefinitionMap>>>;

/// Per-timeframe definition cache over a [`DefinitionStore`]
pub struct DefinitionRegistry {
    store: Arc<dyn DefinitionStore>,
    slots: [Slot; Timeframe::ALL.len()],
}

impl std::fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("loaded", &self.loaded_timeframes())
            .finish_non_exhaustive()
    }
}

#[inline]
pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl DefinitionRegistry {
    pub fn new(store: Arc<dyn DefinitionStore>) -> Self {
        Self {
            store,
            slots: Default::default(),
        }
    }

    /// Definitions for `timeframe`, querying the store on first use.
    ///
    /// A store failure leaves the slot empty so the next call retries.
    pub fn load_definitions(&self, timeframe: Timeframe) -> Result<Arc<DefinitionMap>> {
        let slot = &self.slots[timeframe.index()];
        if let Some(map) = slot.read().as_ref() {
            return Ok(Arc::clone(map));
        }

        let mut guard = slot.write();
        // another thread may have loaded while we waited
        if let Some(map) = guard.as_ref() {
            return Ok(Arc::clone(map));
        }

        let records = self.store.fetch_definitions(timeframe).map_err(|e| match e {
            EngineError::Store(_) => e,
            other => EngineError::Store(other.to_string()),
        })?;
        let map = Arc::new(build_map(timeframe, records));
        info!(%timeframe, count = map.len(), "loaded definitions");
        *guard = Some(Arc::clone(&map));
        Ok(map)
    }

    /// Definition by name, or `None` when the timeframe does not define it
    pub fn get(&self, timeframe: Timeframe, name: &str) -> Result<Option<Definition>> {
        let map = self.load_definitions(timeframe)?;
        Ok(map.get(&normalize(name)).cloned())
    }

    /// Definition by name; a miss is [`EngineError::UnknownDefinition`]
    pub fn require(&self, timeframe: Timeframe, name: &str) -> Result<Definition> {
        self.get(timeframe, name)?.ok_or_else(|| EngineError::UnknownDefinition {
            name: name.to_string(),
            timeframe,
        })
    }

    /// Drop the cached definitions of one timeframe
    pub fn invalidate(&self, timeframe: Timeframe) {
        if self.slots[timeframe.index()].write().take().is_some() {
            debug!(%timeframe, "invalidated definitions");
        }
    }

    pub fn invalidate_all(&self) {
        for timeframe in Timeframe::ALL {
            self.invalidate(timeframe);
        }
    }

    /// Timeframes currently cached
    pub fn loaded_timeframes(&self) -> Vec<Timeframe> {
        Timeframe::ALL
            .into_iter()
            .filter(|tf| self.slots[tf.index()].read().is_some())
            .collect()
    }

    /// Defined names of `timeframe`, in display order
    pub fn names(&self, timeframe: Timeframe) -> Result<Vec<String>> {
        let map = self.load_definitions(timeframe)?;
        Ok(map.values().map(|d| d.name().to_string()).collect())
    }
}

/// Filter, validate and order raw records. Malformed and duplicate entries are
/// skipped with a warning.
fn build_map(timeframe: Timeframe, records: Vec<DefinitionRecord>) -> DefinitionMap {
    let mut definitions: Vec<Definition> = Vec::with_capacity(records.len());
    for record in records {
        if !record.enabled {
            continue;
        }
        let name = record.name.clone();
        match Definition::try_from(record) {
            Ok(def) if def.applies_to(timeframe) => definitions.push(def),
            Ok(_) => {}
            Err(e) => warn!(%timeframe, name = %name, error = %e, "skipping malformed definition"),
        }
    }

    // stable: equal (order, name) keeps store order, so the first duplicate wins
    definitions.sort_by(|a, b| {
        a.display_order()
            .cmp(&b.display_order())
            .then_with(|| normalize(a.name()).cmp(&normalize(b.name())))
    });

    let mut map = DefinitionMap::with_capacity(definitions.len());
    for def in definitions {
        let key = normalize(def.name());
        if map.contains_key(&key) {
            warn!(%timeframe, name = def.name(), "skipping duplicate definition");
            continue;
        }
        map.insert(key, def);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{definition::DefinitionKind, store::InMemoryDefinitionStore};

    struct FailingStore;

    impl DefinitionStore for FailingStore {
        fn fetch_definitions(&self, _timeframe: Timeframe) -> Result<Vec<DefinitionRecord>> {
            Err(EngineError::Store("connection refused".to_string()))
        }
    }

    fn registry(records: Vec<DefinitionRecord>) -> (Arc<InMemoryDefinitionStore>, DefinitionRegistry) {
        let store = Arc::new(InMemoryDefinitionStore::new(records));
        let registry = DefinitionRegistry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn test_single_query_per_timeframe() {
        let (store, reg) = registry(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        reg.load_definitions(Timeframe::Daily).unwrap();
        reg.load_definitions(Timeframe::Daily).unwrap();
        reg.get(Timeframe::Daily, "rsi").unwrap();
        assert_eq!(store.query_count(), 1);
        reg.load_definitions(Timeframe::Weekly).unwrap();
        assert_eq!(store.query_count(), 2);
        assert_eq!(reg.loaded_timeframes(), vec![Timeframe::Daily, Timeframe::Weekly]);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let (_, reg) = registry(vec![DefinitionRecord::indicator("Bollinger Bands", "bollinger_bands")]);
        let def = reg.require(Timeframe::Daily, "BOLLINGER bands").unwrap();
        assert_eq!(def.name(), "Bollinger Bands");
        assert_eq!(def.kind(), DefinitionKind::Indicator);
    }

    #[test]
    fn test_unknown_name_is_error() {
        let (_, reg) = registry(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        assert!(reg.get(Timeframe::Daily, "macd").unwrap().is_none());
        let err = reg.require(Timeframe::Daily, "macd").unwrap_err();
        assert!(matches!(err, EngineError::UnknownDefinition { .. }));
    }

    #[test]
    fn test_filters_disabled_and_inapplicable() {
        let (_, reg) = registry(vec![
            DefinitionRecord::indicator("RSI", "rsi").disabled(),
            DefinitionRecord::indicator("ATR", "atr").with_timeframes(vec![Timeframe::Weekly]),
            DefinitionRecord::indicator("SMA", "sma"),
        ]);
        assert_eq!(reg.names(Timeframe::Daily).unwrap(), vec!["SMA"]);
        assert_eq!(reg.names(Timeframe::Weekly).unwrap(), vec!["ATR", "SMA"]);
    }

    #[test]
    fn test_display_order_then_name() {
        let (_, reg) = registry(vec![
            DefinitionRecord::indicator("RSI", "rsi").with_display_order(2),
            DefinitionRecord::indicator("MACD", "macd").with_display_order(1),
            DefinitionRecord::indicator("ATR", "atr").with_display_order(2),
        ]);
        assert_eq!(reg.names(Timeframe::Daily).unwrap(), vec!["MACD", "ATR", "RSI"]);
    }

    #[test]
    fn test_malformed_and_duplicates_skipped() {
        let mut missing = DefinitionRecord::indicator("Broken", "rsi");
        missing.implementation = None;
        let (_, reg) = registry(vec![
            missing,
            DefinitionRecord::pattern("Doji", "doji").with_confidence_threshold(2.0),
            DefinitionRecord::indicator("RSI", "rsi").with_min_bars(15),
            DefinitionRecord::indicator("rsi", "rsi").with_min_bars(99),
        ]);
        let map = reg.load_definitions(Timeframe::Daily).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["rsi"].min_bars_required(), 15);
    }

    #[test]
    fn test_store_failure_caches_nothing() {
        let reg = DefinitionRegistry::new(Arc::new(FailingStore));
        assert!(matches!(reg.load_definitions(Timeframe::Daily), Err(EngineError::Store(_))));
        assert!(reg.loaded_timeframes().is_empty());
        assert!(reg.require(Timeframe::Daily, "rsi").is_err());
    }

    #[test]
    fn test_invalidate_reloads() {
        let (store, reg) = registry(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        let before = reg.require(Timeframe::Daily, "rsi").unwrap();
        store.push(DefinitionRecord::indicator("ATR", "atr"));
        assert!(reg.get(Timeframe::Daily, "atr").unwrap().is_none());

        reg.invalidate(Timeframe::Daily);
        assert!(reg.get(Timeframe::Daily, "atr").unwrap().is_some());
        let after = reg.require(Timeframe::Daily, "rsi").unwrap();
        assert!(!before.ptr_eq(&after));
        assert_eq!(store.query_count(), 2);

        reg.load_definitions(Timeframe::Weekly).unwrap();
        reg.invalidate_all();
        assert!(reg.loaded_timeframes().is_empty());
    }

    #[test]
    fn test_concurrent_first_load_queries_once() {
        let (store, reg) = registry(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| reg.require(Timeframe::Hourly, "rsi").unwrap());
            }
        });
        assert_eq!(store.query_count(), 1);
    }
}
