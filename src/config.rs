//! Layered configuration
//!
//! Precedence, lowest first: built-in defaults, the TOML config file,
//! `HARMONY__*` environment variables, then explicit builder overrides.
//! A `.env` file in the working directory is loaded into the environment
//! before anything is read.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::interpreter::DEFAULT_SUMMARIZE_PROMPT;
use crate::parser::semantic_validator::ValidatorOptions;
use crate::schema::{JsonSchemaValidator, SchemaLoadError};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "harmony.toml";

const ENV_PREFIX: &str = "HARMONY";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema: SchemaConfig,
    pub validation: ValidationConfig,
    pub execution: ExecutionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Replaces the bundled envelope schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Whether warning-severity violations fail validation
    pub warnings_fail: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub summarize_prompt: String,
    /// Version given to envelopes built from wire text
    pub default_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: SchemaConfig::default(),
            validation: ValidationConfig {
                warnings_fail: ValidatorOptions::default().warnings_fail,
            },
            execution: ExecutionConfig {
                summarize_prompt: DEFAULT_SUMMARIZE_PROMPT.to_string(),
                default_version: "1.0".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides.
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn validator_options(&self) -> ValidatorOptions {
        ValidatorOptions {
            warnings_fail: self.validation.warnings_fail,
        }
    }

    /// Schema validator for the configured envelope schema.
    pub fn schema_validator(&self) -> Result<JsonSchemaValidator, SchemaLoadError> {
        match &self.schema.envelope_path {
            Some(path) => JsonSchemaValidator::from_path(path),
            None => JsonSchemaValidator::bundled(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    /// Config file to read instead of `harmony.toml`. It must exist.
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("validation.warnings_fail", defaults.validation.warnings_fail)?
            .set_default("execution.summarize_prompt", defaults.execution.summarize_prompt)?
            .set_default("execution.default_version", defaults.execution.default_version)?
            .set_default("logging.level", defaults.logging.level)?;

        builder = match &self.config_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                tracing::debug!(path = %path.display(), "loading config file");
                builder.add_source(config::File::from(path.as_path()).format(config::FileFormat::Toml))
            }
            None => builder.add_source(
                config::File::from(Path::new(DEFAULT_CONFIG_FILE))
                    .format(config::FileFormat::Toml)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        if let Some(level) = self.log_level {
            builder = builder.set_override("logging.level", level)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("harmony-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validation.warnings_fail);
        assert_eq!(config.execution.summarize_prompt, "Summarize the results above.");
        assert_eq!(config.execution.default_version, "1.0");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.schema.envelope_path, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_config(
            r#"
            [validation]
            warnings_fail = false

            [execution]
            summarize_prompt = "Wrap up."
            "#,
        );

        let config = Config::builder().config_path(Some(path.clone())).build().unwrap();
        std::fs::remove_file(path).ok();

        assert!(!config.validation.warnings_fail);
        assert!(!config.validator_options().warnings_fail);
        assert_eq!(config.execution.summarize_prompt, "Wrap up.");
        assert_eq!(config.execution.default_version, "1.0");
    }

    #[test]
    fn test_log_level_override() {
        let path = write_config("[logging]\nlevel = \"warn\"\n");

        let config = Config::builder()
            .config_path(Some(path.clone()))
            .log_level(Some("trace".to_string()))
            .build()
            .unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .config_path(Some(PathBuf::from("/nonexistent/harmony.toml")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[execution]"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_bundled_schema_when_no_path() {
        assert!(Config::default().schema_validator().is_ok());
    }
}
