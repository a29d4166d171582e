//! Configuration module for the COS client
//!
//! Handles loading and parsing of YAML client configuration with support for
//! environment variable expansion and validation.
//!
//! ```yaml
//! region: cn-south
//! app_id: "1250000000"
//! secret_id: ${COS_SECRET_ID}
//! secret_key: ${COS_SECRET_KEY}
//! secure: true
//! connect_timeout_secs: 10
//! retry:
//!   min_attempts: 5
//!   total_millis: 5000
//!   delay_millis: 1000
//! ```

use crate::cos::{AttemptStrategy, Region};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = env_var_pattern();
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_name = &cap[1];

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

fn env_var_pattern() -> &'static regex_lite::Regex {
    static PATTERN: std::sync::OnceLock<regex_lite::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}")
            .expect("env var pattern is valid")
    })
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Fixed `host[:port]` replacing the derived bucket endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: Region::default(),
            app_id: String::new(),
            secret_id: String::new(),
            secret_key: String::new(),
            secure: default_secure(),
            endpoint: None,
            connect_timeout_secs: None,
            debug: false,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.as_str().is_empty() {
            return Err(ConfigError::ValidationError("region must not be empty".into()));
        }
        if self.secret_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "secret_id must not be empty".into(),
            ));
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "secret_key must not be empty".into(),
            ));
        }
        if let Some(endpoint) = &self.endpoint {
            if endpoint.contains("://") {
                return Err(ConfigError::ValidationError(format!(
                    "endpoint '{}' must be host[:port] without a scheme",
                    endpoint
                )));
            }
        }
        if self.connect_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_secure() -> bool {
    true
}

/// Attempt loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_min_attempts")]
    pub min_attempts: u32,
    #[serde(default = "default_total_millis")]
    pub total_millis: u64,
    #[serde(default = "default_delay_millis")]
    pub delay_millis: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_attempts: default_min_attempts(),
            total_millis: default_total_millis(),
            delay_millis: default_delay_millis(),
        }
    }
}

impl RetryConfig {
    pub fn strategy(&self) -> AttemptStrategy {
        AttemptStrategy::new(
            self.min_attempts,
            Duration::from_millis(self.total_millis),
            Duration::from_millis(self.delay_millis),
        )
    }
}

fn default_min_attempts() -> u32 {
    5
}

fn default_total_millis() -> u64 {
    5000
}

fn default_delay_millis() -> u64 {
    1000
}
