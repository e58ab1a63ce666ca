//! Reactor configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → ReactorConfig::load / from_toml_str (parse & deserialize)
//!     → ReactorConfig::validate (semantic checks)
//!     → Reactor::with_config (timeout, kickoff delay, subscriptions)
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::reactor::{DEFAULT_KICKOFF_DELAY_MS, DEFAULT_TIMEOUT};
use crate::signal::MatchRule;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a [`ReactorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Every semantic problem found, not just the first.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Settings for a [`Reactor`](crate::Reactor).
///
/// ```toml
/// timeout_secs = 300
/// kickoff_delay_ms = 50
///
/// [[subscriptions]]
/// signal = "JobFinished"
/// interface = "org.example.Jobs"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Watchdog interval in seconds; fractions are allowed.
    pub timeout_secs: f64,

    /// Delay before the kickoff action runs.
    pub kickoff_delay_ms: u64,

    /// Rules subscribed by [`Reactor::with_config`](crate::Reactor::with_config).
    pub subscriptions: Vec<MatchRule>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            kickoff_delay_ms: DEFAULT_KICKOFF_DELAY_MS,
            subscriptions: Vec::new(),
        }
    }
}

impl ReactorConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Validation`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// as [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    /// Checks the values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] listing every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if Duration::try_from_secs_f64(self.timeout_secs).is_err() {
            problems.push(format!(
                "timeout_secs must be a non-negative number of seconds within range, got {}",
                self.timeout_secs
            ));
        }

        for (i, rule) in self.subscriptions.iter().enumerate() {
            if rule.signal.is_empty() {
                problems.push(format!("subscriptions[{i}].signal must not be empty"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }

    /// The watchdog interval as a [`Duration`].
    ///
    /// Only an unvalidated config can be out of range; it falls back to
    /// the default.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(DEFAULT_TIMEOUT)
    }
}
