//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! key_prefix = "postgrest"
//! default_schema = "public"
//! unresolved = "invalidate"
//! debug = false
//! ```

use crate::{codec::DEFAULT_PREFIX, query::DEFAULT_SCHEMA};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

///
/// UnresolvedPolicy
///
/// What the engine does with an entry it cannot patch deterministically.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Mark the entry stale through the adapter.
    #[default]
    Invalidate,
    /// Leave the entry untouched.
    Skip,
}

///
/// EngineConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// First segment of every cache key the engine owns.
    pub key_prefix: String,
    /// Schema used for requests that do not name one.
    pub default_schema: String,
    pub unresolved: UnresolvedPolicy,
    /// Print one `[debug]` line per engine decision.
    pub debug: bool,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "key_prefix",
                reason: "must not be empty",
            });
        }
        if self.key_prefix.contains('$') {
            return Err(ConfigError::Invalid {
                field: "key_prefix",
                reason: "must not contain the '$' segment separator",
            });
        }
        if self.default_schema.is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_schema",
                reason: "must not be empty",
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub const fn with_unresolved(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_PREFIX.to_string(),
            default_schema: DEFAULT_SCHEMA.to_string(),
            unresolved: UnresolvedPolicy::default(),
            debug: false,
        }
    }
}

///
/// TESTS
///
