use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::QueryError;

/// Engine tuning. Every field has a default, so a TOML file only needs the
/// keys it changes.
///
/// ```toml
/// epsilon = 0.00001
/// max_in_values = 1000
/// max_concurrency = 8
/// slow_query_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Doubles closer than this compare equal.
    pub epsilon: f64,
    /// Longest value list a single condition may carry.
    pub max_in_values: usize,
    /// Collections evaluated at the same time.
    pub max_concurrency: usize,
    pub slow_query_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { epsilon: 1e-5, max_in_values: 1000, max_concurrency: 8, slow_query_ms: 500 }
    }
}

impl QueryConfig {
    /// # Errors
    /// Returns `Config` on invalid TOML or out-of-range values.
    pub fn from_toml_str(s: &str) -> Result<Self, QueryError> {
        let cfg: Self = toml::from_str(s).map_err(|e| QueryError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    /// Returns `Io` when the file cannot be read, `Config` when it is invalid.
    pub fn load(path: &Path) -> Result<Self, QueryError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s).map_err(|e| QueryError::Config(format!("{}: {e}", path.display())))
    }

    /// Overrides fields from `CAMTRAP_QUERY_*` variables. Unparsable values
    /// are logged and ignored.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_vars(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            let raw = get(key)?;
            let v = raw.trim().parse::<T>().ok();
            if v.is_none() {
                log::warn!("ignoring {key}={raw}: not a valid value");
            }
            v
        }
        if let Some(v) = parsed(&get, "CAMTRAP_QUERY_EPSILON") {
            self.epsilon = v;
        }
        if let Some(v) = parsed(&get, "CAMTRAP_QUERY_MAX_IN") {
            self.max_in_values = v;
        }
        if let Some(v) = parsed(&get, "CAMTRAP_QUERY_MAX_CONCURRENCY") {
            self.max_concurrency = v;
        }
        if let Some(v) = parsed(&get, "CAMTRAP_QUERY_SLOW_MS") {
            self.slow_query_ms = v;
        }
        self
    }

    /// # Errors
    /// Rejects a non-positive or non-finite epsilon and zero limits.
    pub fn validate(&self) -> Result<(), QueryError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(QueryError::Config(format!("epsilon must be positive, got {}", self.epsilon)));
        }
        if self.max_concurrency == 0 {
            return Err(QueryError::Config("max_concurrency must be at least 1".into()));
        }
        if self.max_in_values == 0 {
            return Err(QueryError::Config("max_in_values must be at least 1".into()));
        }
        Ok(())
    }
}
