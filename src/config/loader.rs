//! Configuration loader with environment variable expansion

use super::{expand_env_vars, ClientConfig, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration text, expanding `${VAR}` and `${VAR:-default}`
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<ClientConfig, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: ClientConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        tracing::debug!(region = %config.region, app_id = %config.app_id, "Loaded COS client config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_vars() {
        std::env::set_var("COS_LOADER_TEST_KEY", "from-env");
        let config = ConfigLoader::from_str(
            "secret_id: id\nsecret_key: ${COS_LOADER_TEST_KEY}\nregion: ${COS_LOADER_TEST_REGION:-cn-east}\n",
        )
        .unwrap();
        assert_eq!(config.secret_key, "from-env");
        assert_eq!(config.region.as_str(), "cn-east");
        std::env::remove_var("COS_LOADER_TEST_KEY");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ConfigLoader::from_str("secret_id: id\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = ConfigLoader::from_str("secure: [not, a, bool]\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
