use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::types::OrphanPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub groups: GroupsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Rules applied by the group service.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupsConfig {
    /// Maximum group name length, in characters.
    pub name_max_length: usize,
    /// Upper bound on rows returned by a listing.
    pub search_limit: usize,
    pub orphan_policy: OrphanPolicy,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            name_max_length: DEFAULT_NAME_MAX_LENGTH,
            search_limit: DEFAULT_SEARCH_LIMIT,
            orphan_policy: OrphanPolicy::Forbid,
        }
    }
}

/// Width of the `ad_group.name` column; also the upper bound for `groups.name_max_length`.
pub const DEFAULT_NAME_MAX_LENGTH: usize = 64;
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `config.toml` values.
    ///
    /// ## Errors
    /// Returns an error if building or deserializing the configuration fails, or if
    /// [`Settings::validate`] rejects it.
    pub fn load() -> Result<Self> {
        let settings = Self::builder()?
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Checks values that deserialize fine but cannot be honoured.
    ///
    /// ## Errors
    /// Returns `ConfigError` naming the first offending key.
    pub fn validate(&self) -> CoreResult<()> {
        if self.database.max_connections == 0 {
            return Err(CoreError::ConfigError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        let name_max_length = self.groups.name_max_length;
        if name_max_length == 0 || name_max_length > DEFAULT_NAME_MAX_LENGTH {
            return Err(CoreError::ConfigError(format!(
                "groups.name_max_length must be between 1 and {DEFAULT_NAME_MAX_LENGTH}, got {name_max_length}"
            )));
        }

        if self.groups.search_limit == 0 {
            return Err(CoreError::ConfigError(
                "groups.search_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// ## Summary
    /// Returns a builder with defaults and the optional `config.toml` source applied.
    ///
    /// ## Errors
    /// Returns an error if a default value cannot be set.
    pub fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("database.max_connections", 4)?
            .set_default("logging.level", "info")?
            .set_default(
                "groups.name_max_length",
                u64::try_from(DEFAULT_NAME_MAX_LENGTH)?,
            )?
            .set_default("groups.search_limit", u64::try_from(DEFAULT_SEARCH_LIMIT)?)?
            .set_default("groups.orphan_policy", "forbid")?
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false)))
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
