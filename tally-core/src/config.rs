//! Configuration types

use crate::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_CATEGORY_WEIGHT, TIMEOUT_DISABLED_MS};
use crate::{ConfigError, TallyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for the orchestration core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyConfig {
    /// TTL applied to cache writes that do not carry their own.
    pub cache_ttl: Duration,
    /// Upper bound for one sub-request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Weight for categories missing from a caller's weight map.
    pub default_weight: f64,
    /// Cap on concurrent remote calls. `None` is unbounded.
    pub max_in_flight: Option<usize>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            request_timeout: None,
            default_weight: DEFAULT_CATEGORY_WEIGHT,
            max_in_flight: None,
        }
    }
}

impl TallyConfig {
    /// Load configuration from `TALLY_*` environment variables, falling back
    /// to defaults for anything missing or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_ttl = std::env::var("TALLY_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let request_timeout = match std::env::var("TALLY_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(TIMEOUT_DISABLED_MS) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.request_timeout,
        };

        let default_weight = std::env::var("TALLY_DEFAULT_WEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_weight);

        let max_in_flight = match std::env::var("TALLY_MAX_IN_FLIGHT")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_in_flight,
        };

        Self {
            cache_ttl,
            request_timeout,
            default_weight,
            max_in_flight,
        }
    }

    /// Builder-style timeout override.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builder-style concurrency cap.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TallyResult<()> {
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: format!("{:?}", self.cache_ttl),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        if let Some(timeout) = self.request_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "request_timeout".to_string(),
                    value: format!("{:?}", timeout),
                    reason: "must be positive when set".to_string(),
                }
                .into());
            }
        }

        if !self.default_weight.is_finite() || self.default_weight <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "default_weight".to_string(),
                value: self.default_weight.to_string(),
                reason: "must be a finite positive number".to_string(),
            }
            .into());
        }

        if self.max_in_flight == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_in_flight".to_string(),
                value: "0".to_string(),
                reason: "use None for unbounded".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
