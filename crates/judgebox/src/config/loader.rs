//! Configuration file loading for judgebox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, LanguageId};

/// Prefix for environment overrides (`JUDGEBOX__ISOLATION=native`)
const ENV_PREFIX: &str = "JUDGEBOX";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Config {
    /// Load configuration from a file, then apply `JUDGEBOX__*` environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(File::from(path.as_ref()), environment())
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn build<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(super::EXAMPLE_CONFIG, FileFormat::Toml))
            .add_source(file)
            .add_source(env)
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        for (id, lang) in &self.languages {
            id.parse::<LanguageId>().map_err(|_| {
                ConfigError::Invalid(format!("unsupported language '{id}' in configuration"))
            })?;
            lang.validate(id)?;
        }

        if self.max_source_chars == 0 {
            return Err(ConfigError::Invalid("max_source_chars must be positive".into()));
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigError::Invalid("max_output_bytes must be positive".into()));
        }
        if self.compile_timeout_ms == 0 {
            return Err(ConfigError::Invalid("compile_timeout_ms must be positive".into()));
        }
        if self.container.memory_mb == 0 || self.container.cpus <= 0.0 {
            return Err(ConfigError::Invalid(
                "container memory and cpu limits must be positive".into(),
            ));
        }
        if let Some(ref throttle) = self.throttle
            && (throttle.max_attempts == 0 || throttle.window_secs == 0)
        {
            return Err(ConfigError::Invalid(
                "throttle max_attempts and window_secs must be positive".into(),
            ));
        }

        Ok(())
    }
}
