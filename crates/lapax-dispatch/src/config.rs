//! Dispatch tuning configuration.
//!
//! Kernel-selection thresholds are backend-specific heuristics. They live
//! here as named values so that they can be revisited per backend release
//! without touching the selection logic.
//!
//! ```toml
//! # lapax.toml
//! getrf_batched_threshold = 128
//! enable_batched_getrf = true
//! ```
//!
//! The threshold can also be overridden with
//! `LAPAX_GETRF_BATCHED_THRESHOLD`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default for [`DispatchConfig::getrf_batched_threshold`].
pub const DEFAULT_GETRF_BATCHED_THRESHOLD: usize = 128;

/// Environment variable overriding the batched LU threshold.
pub const GETRF_THRESHOLD_ENV: &str = "LAPAX_GETRF_BATCHED_THRESHOLD";

/// Errors loading a [`DispatchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("invalid dispatch configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override is not a valid value.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Tunable kernel-selection policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Upper bound on `side / batch` for the batched small-matrix LU kernel.
    pub getrf_batched_threshold: usize,
    /// Allow the batched LU kernel at all.
    pub enable_batched_getrf: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            getrf_batched_threshold: DEFAULT_GETRF_BATCHED_THRESHOLD,
            enable_batched_getrf: true,
        }
    }
}

impl DispatchConfig {
    /// Parses a configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed input or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a variable is set but unparsable.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_threshold_override(std::env::var(GETRF_THRESHOLD_ENV).ok().as_deref())
    }

    fn with_threshold_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = value {
            self.getrf_batched_threshold =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: GETRF_THRESHOLD_ENV,
                    value: raw.to_string(),
                })?;
        }
        Ok(self)
    }
}
