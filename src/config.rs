//! Engine configuration
//!
//! Loaded from TOML. Every section and key is optional:
//!
//! ```toml
//! [registry]
//! definitions_path = "definitions.toml"
//!
//! [analysis]
//! apply_confidence_filter = true
//! default_confidence_threshold = 0.6
//! parallel = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// TOML definitions file read by [`crate::store::TomlDefinitionStore`].
    /// Relative paths resolve against the config file's directory.
    pub definitions_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Drop pattern firings scored below the definition's threshold
    pub apply_confidence_filter: bool,
    /// Threshold for pattern definitions that do not set one
    pub default_confidence_threshold: Option<f64>,
    /// Run multi-symbol batches on the rayon pool
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            apply_confidence_filter: true,
            default_confidence_threshold: None,
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;

        if let (Some(defs), Some(dir)) = (config.registry.definitions_path.as_ref(), path.parent()) {
            if defs.is_relative() {
                config.registry.definitions_path = Some(dir.join(defs));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.analysis.default_confidence_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(EngineError::Config(format!(
                    "default_confidence_threshold {t} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.analysis.apply_confidence_filter);
        assert!(config.analysis.parallel);
        assert!(config.registry.definitions_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            "[analysis]\nparallel = false\ndefault_confidence_threshold = 0.65\n",
        )
        .unwrap();
        assert!(!config.analysis.parallel);
        assert!(config.analysis.apply_confidence_filter);
        assert_eq!(config.analysis.default_confidence_threshold, Some(0.65));
    }

    #[test]
    fn test_threshold_validated() {
        let err = EngineConfig::from_toml_str("[analysis]\ndefault_confidence_threshold = 1.2\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("[analysis\nparallel = true"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_load_resolves_relative_definitions_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[registry]\ndefinitions_path = \"defs.toml\"\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.registry.definitions_path, Some(dir.path().join("defs.toml")));
    }
}
