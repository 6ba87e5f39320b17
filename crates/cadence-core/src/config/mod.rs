use anyhow::Result;
use config::{Config, ConfigBuilder, builder::DefaultState};
use serde::Deserialize;

use crate::constants::{DEFAULT_FOR_EACH_LIMIT, DEFAULT_LOG_LEVEL};
use crate::error::{CoreError, CoreResult};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub expansion: ExpansionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExpansionConfig {
    /// Maximum cursor steps taken by one expansion call.
    pub for_each_limit: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            for_each_limit: DEFAULT_FOR_EACH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional `config.toml`.
    /// Environment variables take precedence over file values.
    ///
    /// Environment keys use the `CADENCE_` prefix and `__` between sections,
    /// e.g. `CADENCE_EXPANSION__FOR_EACH_LIMIT=250`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing it, or
    /// validating it fails.
    pub fn load() -> Result<Self> {
        let settings = Self::builder()?
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            // Env
            .add_source(
                config::Environment::with_prefix("CADENCE")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        tracing::trace!(
            for_each_limit = settings.expansion.for_each_limit,
            level = %settings.logging.level,
            "Settings loaded"
        );
        Ok(settings)
    }

    /// ## Summary
    /// Builds settings from an in-memory TOML document layered over the defaults.
    ///
    /// ## Errors
    /// Returns an error if the document is invalid or fails validation.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let limit = i64::try_from(DEFAULT_FOR_EACH_LIMIT)?;
        Ok(Config::builder()
            .set_default("expansion.for_each_limit", limit)?
            .set_default("logging.level", DEFAULT_LOG_LEVEL)?)
    }

    /// ## Summary
    /// Checks values that deserialize fine but make no sense at runtime.
    ///
    /// ## Errors
    /// Returns `CoreError::ConfigError` if the expansion limit is zero or the
    /// log level is blank.
    pub fn validate(&self) -> CoreResult<()> {
        if self.expansion.for_each_limit == 0 {
            return Err(CoreError::ConfigError(
                "expansion.for_each_limit must be at least 1".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
