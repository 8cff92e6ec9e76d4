use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult as Result};
use crate::store::Connection;

/// Failure message used when none is configured; `{PATH}` becomes the field path
pub const DEFAULT_MESSAGE: &str = "{PATH} references a non existing ID";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Options accepted by [`crate::attach`] and [`crate::IdValidator::validate`]
#[derive(Clone, Default)]
pub struct ValidatorOptions {
    /// Failure message template, defaults to [`DEFAULT_MESSAGE`]
    pub message: Option<String>,
    /// Store to check references against, defaults to the process-wide connection
    pub connection: Option<Arc<dyn Connection>>,
    /// Accept arrays that list the same id more than once
    pub allow_duplicates: bool,
}

impl ValidatorOptions {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }
}

impl fmt::Debug for ValidatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorOptions")
            .field("message", &self.message)
            .field(
                "connection",
                &self.connection.as_ref().map(|connection| connection.name().to_string()),
            )
            .field("allow_duplicates", &self.allow_duplicates)
            .finish()
    }
}

/// Serializable validator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Failure message template
    pub message: String,
    /// Accept arrays that list the same id more than once
    pub allow_duplicates: bool,
    /// Stop a validation pass at the first failing field
    pub fail_fast: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            allow_duplicates: false,
            fail_fast: false,
        }
    }
}

impl ValidatorConfig {
    /// Runtime options for this configuration; the connection is supplied separately
    pub fn to_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            message: Some(self.message.clone()),
            connection: None,
            allow_duplicates: self.allow_duplicates,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment
    pub async fn load_config(path: Option<&Path>) -> Result<ValidatorConfig> {
        let mut config = ValidatorConfig::default();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                config = Self::load_from_file(path).await?;
            }
            None => {
                if let Some(found_config) = Self::find_config_file().await? {
                    config = found_config;
                }
            }
        }

        config = Self::apply_environment_overrides(config)?;

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<ValidatorConfig> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<ValidatorConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<ValidatorConfig>> {
        let config_names = [
            "id-validator.toml",
            "id-validator.json",
            ".id-validator.toml",
            ".id-validator.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("id-validator");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: ValidatorConfig) -> Result<ValidatorConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: ValidatorConfig,
    ) -> Result<ValidatorConfig> {
        if let Some(message) = env.get("ID_VALIDATOR_MESSAGE") {
            config.message = message;
        }

        if let Some(allow) = env.get("ID_VALIDATOR_ALLOW_DUPLICATES") {
            config.allow_duplicates = allow.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid ID_VALIDATOR_ALLOW_DUPLICATES value: {}",
                    allow
                ))
            })?;
        }

        if let Some(fail_fast) = env.get("ID_VALIDATOR_FAIL_FAST") {
            config.fail_fast = fail_fast.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid ID_VALIDATOR_FAIL_FAST value: {}",
                    fail_fast
                ))
            })?;
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate_config(config: &ValidatorConfig) -> Result<()> {
        if config.message.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Failure message must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
