//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: DONATIONS_, nested keys split on `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/donations-db/config.toml
//! 4. System directory: /etc/donations-db/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

const APP_NAME: &str = "donations-db";
const ENV_PREFIX: &str = "DONATIONS_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Repository behavior
    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing database connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Whether to apply embedded migrations after connecting
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Repository behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Delimiter for identifier lists in filters (e.g. `user=a|b`)
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: String,

    /// Milliseconds between synthetic creation timestamps of bulk-imported rows (at least 1)
    #[serde(default = "default_bulk_import_step_ms")]
    pub bulk_import_step_ms: i64,

    /// Autocomplete limit applied when the caller passes none (0 = unbounded)
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_secs: default_connection_timeout(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            run_migrations: default_true(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            list_delimiter: default_list_delimiter(),
            bulk_import_step_ms: default_bulk_import_step_ms(),
            suggest_limit: default_suggest_limit(),
        }
    }
}

impl DatabaseConfig {
    /// Pool acquire timeout
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

impl RepositoryConfig {
    /// Reject values that break filter parsing or import ordering
    pub fn validate(&self) -> Result<()> {
        if self.list_delimiter.is_empty() {
            return Err(Error::InvalidConfig(
                "repository.list_delimiter must not be empty".to_string(),
            ));
        }
        if self.bulk_import_step_ms < 1 {
            return Err(Error::InvalidConfig(format!(
                "repository.bulk_import_step_ms must be at least 1, got {}",
                self.bulk_import_step_ms
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_service_name() -> String {
    APP_NAME.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "sqlite://donations.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_list_delimiter() -> String {
    "|".to_string()
}

fn default_bulk_import_step_ms() -> i64 {
    1000
}

fn default_suggest_limit() -> u64 {
    20
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found wins per key):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/donations-db/config.toml
    /// 3. System directory: /etc/donations-db/config.toml
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.repository.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override values from the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.repository.validate()?;
        Ok(config)
    }

    /// Find all possible config file paths
    ///
    /// Returns paths in priority order (highest first).
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(APP_NAME);
        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc").join(APP_NAME).join("config.toml"));

        paths
    }

    /// Get database URL
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            database: DatabaseConfig::default(),
            repository: RepositoryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
        assert_eq!(config.repository.list_delimiter, "|");
        assert_eq!(config.repository.bulk_import_step_ms, 1000);
        assert_eq!(config.repository.suggest_limit, 20);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"
max_connections = 1

[repository]
list_delimiter = ","
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.database.retry_delay_secs, 2);
        assert_eq!(config.repository.list_delimiter, ",");
        assert_eq!(config.repository.bulk_import_step_ms, 1000);
        assert_eq!(config.service.name, "donations-db");
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.url, default_database_url());
    }

    #[test]
    fn test_load_from_rejects_non_increasing_import_step() {
        for step in ["0", "-5"] {
            let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
            writeln!(file, "[repository]\nbulk_import_step_ms = {}", step).unwrap();

            let err = Config::load_from(file.path()).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "step {}: {:?}", step, err);
        }
    }

    #[test]
    fn test_load_from_rejects_empty_list_delimiter() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[repository]\nlist_delimiter = \"\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("list_delimiter"));
    }

    #[test]
    fn test_default_repository_config_is_valid() {
        assert!(RepositoryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_connection_timeout_duration() {
        let config = DatabaseConfig {
            connection_timeout_secs: 3,
            ..DatabaseConfig::default()
        };
        assert_eq!(config.connection_timeout(), Duration::from_secs(3));
    }
}
