//! Analysis orchestrator
//!
//! Runs a batch of named indicators and patterns over one bar series and
//! collects one outcome per requested name, in request order. Per-item problems
//! (unknown name, bad parameters, short input) become entries in the batch;
//! only a failure to load the timeframe's definitions aborts the whole batch.

use std::{sync::Arc, time::Instant};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::{AnalysisConfig, EngineConfig},
    loader::{Algorithm, CapabilityLoader, ResolvedAlgorithm},
    registry::DefinitionRegistry,
    result::{IndicatorResult, PatternDetectionResult, ResultStatus},
    series::BarSeries,
    store::TomlDefinitionStore,
    EngineError, ErrorKind, Result, Timeframe, OHLCV,
};

// ============================================================
// BATCH RESULTS
// ============================================================

/// Why one item of a batch produced no result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<EngineError> for ItemFailure {
    fn from(error: EngineError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one requested name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemOutcome {
    Indicator(IndicatorResult),
    Pattern(PatternDetectionResult),
    Failed(ItemFailure),
}

impl ItemOutcome {
    pub fn as_indicator(&self) -> Option<&IndicatorResult> {
        match self {
            ItemOutcome::Indicator(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_pattern(&self) -> Option<&PatternDetectionResult> {
        match self {
            ItemOutcome::Pattern(r) => Some(r),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        match self {
            ItemOutcome::Failed(f) => Some(f),
            _ => None,
        }
    }

    /// Status of the produced result; `None` for failures
    pub fn status(&self) -> Option<ResultStatus> {
        match self {
            ItemOutcome::Indicator(r) => Some(r.status),
            ItemOutcome::Pattern(r) => Some(r.status),
            ItemOutcome::Failed(_) => None,
        }
    }

    /// A result was produced and calculated successfully
    pub fn is_ok(&self) -> bool {
        self.status().is_some_and(ResultStatus::is_ok)
    }
}

/// Outcomes of one batch, keyed by requested name in request order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub symbol: String,
    pub timeframe: String,
    pub items: IndexMap<String, ItemOutcome>,
}

impl BatchResult {
    fn new(symbol: &str, timeframe: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            items: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ItemOutcome> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemOutcome)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ItemFailure)> {
        self.iter().filter_map(|(k, v)| v.failure().map(|f| (k, f)))
    }

    /// Items whose calculation succeeded
    pub fn ok_count(&self) -> usize {
        self.items.values().filter(|v| v.is_ok()).count()
    }
}

// ============================================================
// ORCHESTRATOR
// ============================================================

/// Runs named algorithms over bar series
#[derive(Debug)]
pub struct AnalysisOrchestrator {
    loader: CapabilityLoader,
    settings: AnalysisConfig,
}

impl AnalysisOrchestrator {
    pub fn new(registry: Arc<DefinitionRegistry>) -> Self {
        Self {
            loader: CapabilityLoader::new(registry),
            settings: AnalysisConfig::default(),
        }
    }

    pub fn with_settings(mut self, settings: AnalysisConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Orchestrator over the TOML definitions file named by `config`
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let path = config
            .registry
            .definitions_path
            .as_ref()
            .ok_or_else(|| EngineError::Config("registry.definitions_path is not set".to_string()))?;
        let store = Arc::new(TomlDefinitionStore::new(path));
        let registry = Arc::new(DefinitionRegistry::new(store));
        Ok(Self::new(registry).with_settings(config.analysis.clone()))
    }

    pub fn loader(&self) -> &CapabilityLoader {
        &self.loader
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        self.loader.registry()
    }

    pub fn settings(&self) -> &AnalysisConfig {
        &self.settings
    }

    /// Analyse `names` over a validated series
    pub fn analyze(&self, series: &BarSeries, timeframe: &str, names: &[&str]) -> Result<BatchResult> {
        self.analyze_bars(series.bars(), series.symbol(), timeframe, names)
    }

    /// Analyse `names` over any bar slice.
    ///
    /// An unknown timeframe marks every item `InvalidTimeframe` without
    /// raising. A registry load failure is returned as `Err`.
    pub fn analyze_bars<T: OHLCV>(
        &self,
        bars: &[T],
        symbol: &str,
        timeframe: &str,
        names: &[&str],
    ) -> Result<BatchResult> {
        let start = Instant::now();
        let mut batch = BatchResult::new(symbol, timeframe);

        let tf = match timeframe.parse::<Timeframe>() {
            Ok(tf) => tf,
            Err(e) => {
                warn!(symbol, timeframe, "invalid timeframe");
                let failure = ItemFailure::from(e);
                for name in names {
                    batch.items.insert(name.to_string(), ItemOutcome::Failed(failure.clone()));
                }
                return Ok(batch);
            }
        };

        self.registry().load_definitions(tf)?;

        for &name in names {
            let outcome = match self.loader.load(tf, name) {
                Ok(resolved) => self.execute(&resolved, bars, symbol, timeframe),
                Err(e) => {
                    debug!(symbol, %tf, name, error = %e, "item failed");
                    ItemOutcome::Failed(e.into())
                }
            };
            batch.items.insert(name.to_string(), outcome);
        }

        info!(
            symbol,
            %tf,
            items = batch.len(),
            ok = batch.ok_count(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "analysis complete"
        );
        Ok(batch)
    }

    /// Analyse every definition of `timeframe`, in display order
    pub fn analyze_all(&self, series: &BarSeries, timeframe: &str) -> Result<BatchResult> {
        let tf: Timeframe = timeframe.parse()?;
        let names = self.registry().names(tf)?;
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.analyze(series, timeframe, &names)
    }

    /// Analyse many series with the same names, one result per series in input
    /// order. Runs on the rayon pool unless `parallel` is disabled.
    pub fn analyze_parallel(
        &self,
        jobs: &[BarSeries],
        timeframe: &str,
        names: &[&str],
    ) -> Vec<Result<BatchResult>> {
        if self.settings.parallel {
            jobs.par_iter()
                .map(|series| self.analyze(series, timeframe, names))
                .collect()
        } else {
            jobs.iter()
                .map(|series| self.analyze(series, timeframe, names))
                .collect()
        }
    }

    fn threshold_for(&self, resolved: &ResolvedAlgorithm) -> Option<f64> {
        if !self.settings.apply_confidence_filter {
            return None;
        }
        resolved
            .definition
            .confidence_threshold()
            .or(self.settings.default_confidence_threshold)
    }

    fn execute<T: OHLCV>(
        &self,
        resolved: &ResolvedAlgorithm,
        bars: &[T],
        symbol: &str,
        timeframe: &str,
    ) -> ItemOutcome {
        let need = resolved.min_bars_required();
        let got = bars.len();
        let short = ResultStatus::InsufficientData { need, got };

        match &resolved.algorithm {
            Algorithm::Indicator(indicator) => {
                let result = if got < need {
                    IndicatorResult::empty(
                        indicator.indicator_type(),
                        symbol,
                        timeframe,
                        short,
                        format!("need {need} bars, got {got}"),
                    )
                } else {
                    indicator.calculate(bars, symbol, timeframe)
                };
                ItemOutcome::Indicator(result)
            }
            Algorithm::Pattern(detector) => {
                let result = if got < need {
                    PatternDetectionResult::empty(detector.id().as_str(), symbol, timeframe, got, short)
                } else {
                    detector.calculate(bars, symbol, timeframe, self.threshold_for(resolved))
                };
                ItemOutcome::Pattern(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        series::Bar,
        store::{DefinitionRecord, DefinitionStore, InMemoryDefinitionStore},
    };

    fn orchestrator(records: Vec<DefinitionRecord>) -> AnalysisOrchestrator {
        let store = Arc::new(InMemoryDefinitionStore::new(records));
        AnalysisOrchestrator::new(Arc::new(DefinitionRegistry::new(store)))
    }

    fn series(n: usize) -> BarSeries {
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.2;
                Bar::from_millis(i as i64 * 86_400_000, c - 0.3, c + 1.0, c - 1.0, c, 1_000 + i as u64)
            })
            .collect();
        BarSeries::new("AAPL", bars).unwrap()
    }

    #[test]
    fn test_batch_keeps_request_order() {
        let o = orchestrator(vec![
            DefinitionRecord::indicator("RSI", "rsi"),
            DefinitionRecord::indicator("MACD", "macd"),
            DefinitionRecord::pattern("Doji", "doji"),
        ]);
        let batch = o.analyze(&series(60), "daily", &["doji", "MACD", "rsi"]).unwrap();
        let keys: Vec<&str> = batch.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["doji", "MACD", "rsi"]);
        assert!(batch.get("rsi").unwrap().as_indicator().unwrap().is_ok());
        assert_eq!(batch.get("doji").unwrap().as_pattern().unwrap().detections.len(), 60);
        assert_eq!(batch.ok_count(), 3);
    }

    #[test]
    fn test_unknown_name_is_item_failure() {
        let o = orchestrator(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        let batch = o.analyze(&series(30), "daily", &["rsi", "vwap"]).unwrap();
        assert!(batch.get("rsi").unwrap().is_ok());
        let failure = batch.get("vwap").unwrap().failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::UnknownDefinition);
        assert_eq!(batch.failures().count(), 1);
    }

    #[test]
    fn test_invalid_timeframe_marks_every_item() {
        let o = orchestrator(vec![DefinitionRecord::indicator("RSI", "rsi")]);
        let batch = o.analyze(&series(30), "yearly", &["rsi", "doji"]).unwrap();
        assert_eq!(batch.len(), 2);
        for (_, outcome) in batch.iter() {
            assert_eq!(outcome.failure().unwrap().kind, ErrorKind::InvalidTimeframe);
        }
    }

    #[test]
    fn test_registry_failure_is_fatal() {
        struct Down;
        impl DefinitionStore for Down {
            fn fetch_definitions(&self, _: Timeframe) -> Result<Vec<DefinitionRecord>> {
                Err(EngineError::Store("unavailable".to_string()))
            }
        }
        let o = AnalysisOrchestrator::new(Arc::new(DefinitionRegistry::new(Arc::new(Down))));
        assert!(matches!(
            o.analyze(&series(30), "daily", &["rsi"]),
            Err(EngineError::Store(_))
        ));
    }

    #[test]
    fn test_definition_min_bars_enforced() {
        let o = orchestrator(vec![
            DefinitionRecord::indicator("RSI", "rsi").with_min_bars(50),
            DefinitionRecord::pattern("Doji", "doji").with_min_bars(50),
        ]);
        let batch = o.analyze(&series(30), "daily", &["rsi", "doji"]).unwrap();

        let rsi = batch.get("rsi").unwrap().as_indicator().unwrap();
        assert_eq!(rsi.status, ResultStatus::InsufficientData { need: 50, got: 30 });
        assert!(rsi.value.is_none());
        assert!(rsi.error().is_some());

        let doji = batch.get("doji").unwrap().as_pattern().unwrap();
        assert_eq!(doji.status, ResultStatus::InsufficientData { need: 50, got: 30 });
        assert_eq!(doji.detections, vec![false; 30]);
    }

    #[test]
    fn test_confidence_filter_toggle() {
        let records = vec![DefinitionRecord::pattern("Doji", "doji").with_confidence_threshold(0.95)];
        let bars: Vec<Bar> = (0..5)
            .map(|i| Bar::from_millis(i * 60_000, 100.0, 102.0, 98.0, 100.05, 1_000))
            .collect();

        let o = orchestrator(records.clone());
        let filtered = o.analyze_bars(&bars, "X", "daily", &["doji"]).unwrap();
        let filtered = filtered.get("doji").unwrap().as_pattern().unwrap();
        assert_eq!(filtered.confidence_threshold, Some(0.95));
        assert_eq!(filtered.detection_count(), 0);

        let settings = AnalysisConfig {
            apply_confidence_filter: false,
            ..AnalysisConfig::default()
        };
        let o = orchestrator(records).with_settings(settings);
        let raw = o.analyze_bars(&bars, "X", "daily", &["doji"]).unwrap();
        assert_eq!(raw.get("doji").unwrap().as_pattern().unwrap().detection_count(), 5);
    }

    #[test]
    fn test_analyze_all_uses_display_order() {
        let o = orchestrator(vec![
            DefinitionRecord::indicator("ATR", "atr").with_display_order(2),
            DefinitionRecord::indicator("SMA", "sma").with_display_order(1),
        ]);
        let batch = o.analyze_all(&series(40), "daily").unwrap();
        let keys: Vec<&str> = batch.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["SMA", "ATR"]);
        assert!(o.analyze_all(&series(40), "yearly").is_err());
    }

    #[test]
    fn test_analyze_parallel_matches_sequential() {
        let o = orchestrator(vec![
            DefinitionRecord::indicator("RSI", "rsi"),
            DefinitionRecord::pattern("Engulfing", "engulfing"),
        ]);
        let jobs: Vec<BarSeries> = (20..26).map(series).collect();
        let parallel = o.analyze_parallel(&jobs, "daily", &["rsi", "engulfing"]);
        assert_eq!(parallel.len(), jobs.len());
        for (job, result) in jobs.iter().zip(&parallel) {
            let expected = o.analyze(job, "daily", &["rsi", "engulfing"]).unwrap();
            let got = result.as_ref().unwrap();
            assert_eq!(got.items.len(), expected.items.len());
            assert_eq!(
                got.get("rsi").unwrap().as_indicator().unwrap().value,
                expected.get("rsi").unwrap().as_indicator().unwrap().value
            );
        }
    }

    #[test]
    fn test_from_config_requires_definitions_path() {
        let err = AnalysisOrchestrator::from_config(&EngineConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
