//! Engine configuration, loadable from and savable to TOML.
//!
//! Every field has a serde default, so a config file only needs the keys it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::argumentation::Semantics;
use crate::error::ConfigError;
use crate::provenance::valid_entrenchment;
use crate::symbol::DEFAULT_FRESH_BASE;
use crate::unify::UnifyMode;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration for the registry, store and revision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Unification regime used by the store and the revision engine.
    #[serde(default)]
    pub unify_mode: UnifyMode,
    /// First id handed out for alpha conversion and renaming apart.
    #[serde(default = "default_fresh_var_base")]
    pub fresh_var_base: u64,
    /// Maximum number of memoized query results; 0 disables the cache.
    #[serde(default = "default_query_cache_capacity")]
    pub query_cache_capacity: usize,
    /// Candidate count above which a context's candidates are matched in parallel.
    #[serde(default = "default_parallel_query_threshold")]
    pub parallel_query_threshold: usize,
    /// Entrenchment assumed for statements that carry none.
    #[serde(default = "default_entrenchment")]
    pub default_entrenchment: f64,
    /// Largest relevant-statement count contraction will enumerate subsets of.
    #[serde(default = "default_max_relevant_statements")]
    pub max_relevant_statements: usize,
    /// Largest framework for which non-grounded semantics are enumerated.
    #[serde(default = "default_max_framework_size")]
    pub max_framework_size: usize,
    /// Semantics used by argumentation-based contraction.
    #[serde(default)]
    pub semantics: Semantics,
}

fn default_fresh_var_base() -> u64 {
    DEFAULT_FRESH_BASE
}
fn default_query_cache_capacity() -> usize {
    1024
}
fn default_parallel_query_threshold() -> usize {
    256
}
fn default_entrenchment() -> f64 {
    0.5
}
fn default_max_relevant_statements() -> usize {
    16
}
fn default_max_framework_size() -> usize {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unify_mode: UnifyMode::default(),
            fresh_var_base: default_fresh_var_base(),
            query_cache_capacity: default_query_cache_capacity(),
            parallel_query_threshold: default_parallel_query_threshold(),
            default_entrenchment: default_entrenchment(),
            max_relevant_statements: default_max_relevant_statements(),
            max_framework_size: default_max_framework_size(),
            semantics: Semantics::default(),
        }
    }
}

impl EngineConfig {
    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if !valid_entrenchment(self.default_entrenchment) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "default_entrenchment must be in [0, 1], got {}",
                    self.default_entrenchment
                ),
            });
        }
        if self.fresh_var_base == 0 {
            return Err(ConfigError::Invalid {
                message: "fresh_var_base must be non-zero".into(),
            });
        }
        if self.parallel_query_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "parallel_query_threshold must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}
