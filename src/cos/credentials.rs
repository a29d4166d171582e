//! COS Credentials
//!
//! The client only needs a secret id / secret key pair. Where the pair comes
//! from (a prompt, a plugin config file, a secrets manager) is up to the caller;
//! this module offers the two sources the client itself understands.
//!
//! # Example
//!
//! ```
//! use cos_client::cos::Credentials;
//!
//! let creds = Credentials::new("secret-id", "secret-key");
//! assert_eq!(creds.secret_id(), "secret-id");
//! assert_eq!(creds.secret_key(), "secret-key");
//! ```

use crate::config::ClientConfig;
use std::fmt;
use thiserror::Error;

/// Environment variable holding the secret id
pub const ENV_SECRET_ID: &str = "COS_SECRET_ID";

/// Environment variable holding the secret key
pub const ENV_SECRET_KEY: &str = "COS_SECRET_KEY";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Secret id / secret key pair used to sign requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    secret_id: String,
    secret_key: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Load credentials from `COS_SECRET_ID` and `COS_SECRET_KEY`
    pub fn from_env() -> Result<Self, CredentialsError> {
        let secret_id = non_empty_env(ENV_SECRET_ID)?;
        let secret_key = non_empty_env(ENV_SECRET_KEY)?;
        Ok(Self::new(secret_id, secret_key))
    }

    /// Take the pair from a client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, CredentialsError> {
        if config.secret_id.is_empty() {
            return Err(CredentialsError::MissingCredentials(
                "secret_id not set in config".into(),
            ));
        }
        if config.secret_key.is_empty() {
            return Err(CredentialsError::MissingCredentials(
                "secret_key not set in config".into(),
            ));
        }
        Ok(Self::new(config.secret_id.clone(), config.secret_key.clone()))
    }

    /// Get the secret id (the `q-ak` value)
    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    /// Get the secret key
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

fn non_empty_env(name: &str) -> Result<String, CredentialsError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(CredentialsError::MissingCredentials(format!("{} not set", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_creation() {
        let creds = Credentials::new("id", "key");
        assert_eq!(creds.secret_id(), "id");
        assert_eq!(creds.secret_key(), "key");
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let creds = Credentials::new("visible-id", "very-secret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("visible-id"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_from_config_missing_secret_key() {
        let config = ClientConfig {
            secret_id: "id".into(),
            ..ClientConfig::default()
        };

        let result = Credentials::from_config(&config);
        assert!(matches!(
            result,
            Err(CredentialsError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_from_config_success() {
        let config = ClientConfig {
            secret_id: "config-id".into(),
            secret_key: "config-key".into(),
            ..ClientConfig::default()
        };

        let creds = Credentials::from_config(&config).unwrap();
        assert_eq!(creds.secret_id(), "config-id");
        assert_eq!(creds.secret_key(), "config-key");
    }
}
