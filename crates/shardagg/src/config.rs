//! Module: config
//! Responsibility: aggregation execution limits and mode switches.
//! Does not own: per-request aggregation specs or profiler enablement.
//! Boundary: loaded once per node and copied into every `SearchContext`.

use serde::Deserialize;
use thiserror::Error as ThisError;

/// Default per-request bucket budget.
pub const DEFAULT_MAX_BUCKETS: u32 = 65_535;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid aggregation config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid aggregation config: max_buckets must be greater than zero")]
    ZeroMaxBuckets,
}

///
/// AggregationConfig
///
/// Hard limits and execution switches for the aggregation phase.
/// Missing keys fall back to the defaults so partial config files stay valid.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Maximum number of buckets a single request may build on this shard.
    pub max_buckets: u32,

    /// Ask the query phase to collect each segment with its own collector and
    /// reduce afterwards. Aggregations refuse this mode.
    pub concurrent_segment_search: bool,
}

impl AggregationConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_buckets: DEFAULT_MAX_BUCKETS,
            concurrent_segment_search: false,
        }
    }

    #[must_use]
    pub const fn with_max_buckets(mut self, max_buckets: u32) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    #[must_use]
    pub const fn with_concurrent_segment_search(mut self, enabled: bool) -> Self {
        self.concurrent_segment_search = enabled;
        self
    }

    /// Parse and validate a TOML config document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buckets == 0 {
            return Err(ConfigError::ZeroMaxBuckets);
        }

        Ok(())
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AggregationConfig::from_toml_str("").expect("empty config should parse");

        assert_eq!(config, AggregationConfig::default());
        assert_eq!(config.max_buckets, DEFAULT_MAX_BUCKETS);
        assert!(!config.concurrent_segment_search);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = AggregationConfig::from_toml_str(
            "max_buckets = 10\nconcurrent_segment_search = true\n",
        )
        .expect("explicit config should parse");

        assert_eq!(config.max_buckets, 10);
        assert!(config.concurrent_segment_search);
    }

    #[test]
    fn zero_bucket_budget_is_rejected() {
        let err = AggregationConfig::from_toml_str("max_buckets = 0")
            .expect_err("zero bucket budget must be rejected");

        assert!(matches!(err, ConfigError::ZeroMaxBuckets));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AggregationConfig::from_toml_str("max_bucket = 5")
            .expect_err("misspelled keys must not be ignored");

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
