//! Configuration handling for session_sync

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::db::IsolationLevel;
use crate::error::{Error, Result};
use crate::schema::MigrationMode;

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete session_sync configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub type_mapping: TypeMappingConfig,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub driver: String,
    pub url: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

/// Schema migration settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MigrationsConfig {
    #[serde(default)]
    pub mode: MigrationMode,
    #[serde(default)]
    pub dry_run: bool,
}

/// Session defaults
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub default_isolation: IsolationLevel,
}

/// Type mapping configuration
///
/// Keys of `override_` are logical type names (`guid`, `string`, ...), values are the
/// SQL type text to emit instead of the built-in mapping.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TypeMappingConfig {
    pub override_: Option<HashMap<String, String>>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_parsing_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            driver = "sqlite"
            url = "sqlite://app.db?mode=rwc"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.driver, "sqlite");
        assert_eq!(config.migrations.mode, MigrationMode::Off);
        assert!(!config.migrations.dry_run);
        assert_eq!(config.session.default_isolation, IsolationLevel::ReadCommitted);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_config_parsing_full() {
        let config: Config = toml::from_str(
            r#"
            [database]
            driver = "sqlite"
            url = "sqlite::memory:"
            pool_size = 2
            timeout_seconds = 5

            [migrations]
            mode = "full"
            dry_run = true

            [session]
            default_isolation = "serializable"

            [type_mapping]
            override_ = { guid = "TEXT" }

            [logging]
            level = "debug"
            format = "json"
            stdout = true
            "#,
        )
        .unwrap();

        assert_eq!(config.database.pool_size, Some(2));
        assert_eq!(config.migrations.mode, MigrationMode::Full);
        assert!(config.migrations.dry_run);
        assert_eq!(config.session.default_isolation, IsolationLevel::Serializable);
        assert_eq!(
            config.type_mapping.override_.unwrap().get("guid").map(String::as_str),
            Some("TEXT")
        );
        assert_eq!(config.logging.unwrap().format, "json");
    }

    #[test]
    fn test_missing_config_file() {
        let result = load_from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }
}
