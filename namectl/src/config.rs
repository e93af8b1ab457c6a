//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. Sources are
//! merged in order, later ones overriding earlier ones:
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `NAMECTL_` override YAML values
//!
//! For nested values use double underscores, e.g. `NAMECTL_CACHE__ENABLED=true` sets
//! `cache.enabled`.
//!
//! ```no_run
//! use namectl::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! println!("Offering {} suggestions per request", config.suggestions.count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! ```yaml
//! suggestions:
//!   patterns:
//!     - "[firstname].[lastname]"
//!     - "[C1_firstname][lastname]"
//!   count: 3
//!   reservation_ttl: 2m
//! cache:
//!   enabled: true
//!   refresh_interval: 24h
//!   initial_delay: 0s
//!   refresh_timeout: 30m
//! ```

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::patterns::invalid_literal_char;

pub const MIN_SUGGESTIONS: usize = 1;
pub const MAX_SUGGESTIONS: usize = 10;
pub const MIN_RESERVATION_TTL: Duration = Duration::from_secs(1);
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Pattern used once the configured list is exhausted.
pub const DEFAULT_PATTERN: &str = "[C9_firstname][C9_lastname][#]";

/// Main application configuration.
///
/// All fields have defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Candidate generation and reservation settings
    pub suggestions: SuggestionConfig,
    /// Directory snapshot cache settings
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuggestionConfig {
    /// Ordered templates evaluated before falling back to [`DEFAULT_PATTERN`]
    pub patterns: Vec<String>,
    /// How many available usernames one request returns (1-10)
    pub count: usize,
    /// How long an offered username stays reserved
    #[serde(with = "humantime_serde")]
    pub reservation_ttl: Duration,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                "[firstname][lastname]".to_string(),
                "[firstname].[lastname]".to_string(),
                "[firstname]_[lastname]".to_string(),
                "[C1_firstname][lastname]".to_string(),
                "[firstname][C1_lastname]".to_string(),
                DEFAULT_PATTERN.to_string(),
            ],
            count: 3,
            reservation_ttl: Duration::from_secs(2 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Serve existence checks from a local snapshot of the directory
    pub enabled: bool,
    /// Time between two snapshot rebuilds
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Delay before the first snapshot is built
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Deadline for one rebuild; an expired deadline counts as a failed refresh
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub refresh_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            refresh_interval: Duration::from_secs(24 * 60 * 60), // 24 hours
            initial_delay: Duration::ZERO,
            refresh_timeout: None,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(path).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("NAMECTL_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let suggestions = &self.suggestions;

        if suggestions.patterns.is_empty() {
            return Err(Error::Validation {
                message: "Config validation: suggestions.patterns must contain at least one pattern".to_string(),
            });
        }

        if let Some(index) = suggestions.patterns.iter().position(|p| p.trim().is_empty()) {
            return Err(Error::Validation {
                message: format!("Config validation: suggestions.patterns[{index}] is empty"),
            });
        }

        for (index, pattern) in suggestions.patterns.iter().enumerate() {
            if let Some(c) = invalid_literal_char(pattern) {
                return Err(Error::Validation {
                    message: format!(
                        "Config validation: suggestions.patterns[{index}] contains {c:?} outside a token; literal text may only use a-z, 0-9, '_', '.' and '-'"
                    ),
                });
            }
        }

        if !(MIN_SUGGESTIONS..=MAX_SUGGESTIONS).contains(&suggestions.count) {
            return Err(Error::Validation {
                message: format!(
                    "Config validation: suggestions.count ({}) must be between {MIN_SUGGESTIONS} and {MAX_SUGGESTIONS}",
                    suggestions.count
                ),
            });
        }

        if suggestions.reservation_ttl < MIN_RESERVATION_TTL {
            return Err(Error::Validation {
                message: format!(
                    "Config validation: suggestions.reservation_ttl must be at least {}s",
                    MIN_RESERVATION_TTL.as_secs()
                ),
            });
        }

        if self.cache.enabled {
            if self.cache.refresh_interval < MIN_REFRESH_INTERVAL {
                return Err(Error::Validation {
                    message: "Config validation: cache.refresh_interval must be at least 1h".to_string(),
                });
            }

            if self.cache.refresh_timeout.is_some_and(|t| t.is_zero()) {
                return Err(Error::Validation {
                    message: "Config validation: cache.refresh_timeout cannot be zero".to_string(),
                });
            }
        }

        Ok(())
    }
}
