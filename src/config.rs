use crate::core::db::{Database, SqliteHandle};
use crate::core::{Backend, Result, StoreError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_SCRIPT_DIR: &str = "dbmigrations";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub migrations: Option<MigrationsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Database connection configuration.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// Backend identifier: `sqlite`, `mysql` or `postgres`
    pub provider: String,
    /// Database file, for the `sqlite` provider
    pub path: Option<PathBuf>,
    pub table_prefix: Option<String>,
}

/// Migration runner configuration.
#[derive(Debug, Deserialize)]
pub struct MigrationsConfig {
    pub script_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Config {
    pub fn table_prefix(&self) -> &str {
        self.database.table_prefix.as_deref().unwrap_or("")
    }

    pub fn script_dir(&self) -> PathBuf {
        self.migrations
            .as_ref()
            .and_then(|m| m.script_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_DIR))
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// The configured backend, if supported.
    pub fn backend(&self) -> Result<Backend> {
        Backend::from_provider(&self.database.provider)
            .ok_or_else(|| StoreError::UnsupportedBackend(self.database.provider.clone()))
    }
}

impl FromStr for Config {
    type Err = StoreError;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = carddav_db::config::load_config("carddav.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| StoreError::Config(format!("{}: {}", path.display(), e)))?;
    content.parse()
}

/// Opens the SQLite database described by `config`.
///
/// # Errors
///
/// Returns `StoreError::Config` if the provider is not `sqlite` or no path is
/// configured; the other providers are opened by the host application.
pub fn open_sqlite(config: &Config) -> Result<Database<SqliteHandle>> {
    if config.backend()? != Backend::Sqlite {
        return Err(StoreError::Config(format!(
            "provider {} has no bundled connection handle",
            config.database.provider
        )));
    }
    let path = config
        .database
        .path
        .as_ref()
        .ok_or_else(|| StoreError::Config("database.path is required for sqlite".to_string()))?;

    Ok(Database::new(SqliteHandle::open(path)?).with_table_prefix(config.table_prefix()))
}
