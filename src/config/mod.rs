//! Configuration management.

use crate::storage::is_valid_identifier;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Record Store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the managed table.
    pub table: String,
    /// Maximum pooled connections. In-memory `SQLite` always uses one.
    pub pool_max_size: usize,
    /// How long a checkout waits for a free connection.
    pub acquire_timeout: Duration,
    /// Whether to create the table at open if it does not exist.
    pub create_table: bool,
}

impl StoreConfig {
    /// Default table name.
    pub const DEFAULT_TABLE: &'static str = "users";
    /// Default maximum pooled connections.
    pub const DEFAULT_POOL_MAX_SIZE: usize = 8;
    /// Default acquire timeout.
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Shortest accepted acquire timeout.
    pub const MIN_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(1);
    /// Longest accepted acquire timeout.
    pub const MAX_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the maximum pool size.
    #[must_use]
    pub const fn with_pool_max_size(mut self, size: usize) -> Self {
        self.pool_max_size = size;
        self
    }

    /// Sets the acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Enables or disables table bootstrap at open.
    #[must_use]
    pub const fn with_create_table(mut self, create: bool) -> Self {
        self.create_table = create;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the table name is not a plain SQL
    /// identifier, the pool size is zero, or the acquire timeout falls
    /// outside [`Self::MIN_ACQUIRE_TIMEOUT`]..=[`Self::MAX_ACQUIRE_TIMEOUT`].
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.table) {
            return Err(Error::InvalidInput(format!(
                "table name '{}' is not a valid identifier",
                self.table
            )));
        }
        if self.pool_max_size == 0 {
            return Err(Error::InvalidInput(
                "pool_max_size must be at least 1".to_string(),
            ));
        }
        let timeouts = Self::MIN_ACQUIRE_TIMEOUT..=Self::MAX_ACQUIRE_TIMEOUT;
        if !timeouts.contains(&self.acquire_timeout) {
            return Err(Error::InvalidInput(format!(
                "acquire_timeout must be between {:?} and {:?}, got {:?}",
                Self::MIN_ACQUIRE_TIMEOUT,
                Self::MAX_ACQUIRE_TIMEOUT,
                self.acquire_timeout
            )));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: Self::DEFAULT_TABLE.to_string(),
            pool_max_size: Self::DEFAULT_POOL_MAX_SIZE,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
            create_table: true,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database target.
    pub database_url: Option<String>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileStore {
    /// Table name.
    pub table: Option<String>,
    /// Maximum pool size.
    pub pool_max_size: Option<usize>,
    /// Acquire timeout in seconds.
    pub acquire_timeout_secs: Option<u64>,
    /// Table bootstrap.
    pub create_table: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level directive, e.g. `info` or `userstore=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Settings loaded from a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Database target, if the file names one.
    pub database_url: Option<String>,
    /// Store configuration (defaults where the file is silent).
    pub store: StoreConfig,
    /// Logging settings, if present.
    pub logging: Option<LoggingSettings>,
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting store configuration is invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let settings = Self::from_config_file(file);
        settings.store.validate()?;
        Ok(settings)
    }

    /// Applies a parsed config file over the defaults.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let mut store = StoreConfig::default();
        if let Some(section) = file.store {
            if let Some(table) = section.table {
                store.table = table;
            }
            if let Some(size) = section.pool_max_size {
                store.pool_max_size = size;
            }
            if let Some(secs) = section.acquire_timeout_secs {
                store.acquire_timeout = Duration::from_secs(secs);
            }
            if let Some(create) = section.create_table {
                store.create_table = create;
            }
        }

        Self {
            database_url: file.database_url,
            store,
            logging: file.logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.table, "users");
        assert_eq!(config.pool_max_size, 8);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert!(config.create_table);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_table_and_empty_pool() {
        assert!(matches!(
            StoreConfig::new().with_table("users--").validate(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            StoreConfig::new().with_pool_max_size(0).validate(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_bounds_acquire_timeout() {
        for timeout in [Duration::ZERO, Duration::from_secs(u64::MAX)] {
            assert!(matches!(
                StoreConfig::new().with_acquire_timeout(timeout).validate(),
                Err(Error::InvalidInput(_))
            ));
        }
        for timeout in [StoreConfig::MIN_ACQUIRE_TIMEOUT, StoreConfig::MAX_ACQUIRE_TIMEOUT] {
            assert!(StoreConfig::new().with_acquire_timeout(timeout).validate().is_ok());
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_url = "sqlite://users.db"

[store]
table = "people"
acquire_timeout_secs = 2
create_table = false

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let settings = Settings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.database_url.as_deref(), Some("sqlite://users.db"));
        assert_eq!(settings.store.table, "people");
        assert_eq!(settings.store.pool_max_size, 8);
        assert_eq!(settings.store.acquire_timeout, Duration::from_secs(2));
        assert!(!settings.store.create_table);

        let logging = settings.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert_eq!(logging.format.as_deref(), Some("json"));
        assert_eq!(logging.file, None);
    }

    #[test]
    fn test_load_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(
            matches!(err, Error::OperationFailed { ref operation, .. } if operation == "read_config_file")
        );
    }

    #[test]
    fn test_load_from_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\ntabel = \"users\"").unwrap();

        let err = Settings::load_from_file(file.path()).unwrap_err();
        assert!(
            matches!(err, Error::OperationFailed { ref operation, .. } if operation == "parse_config_file")
        );
    }

    #[test]
    fn test_load_from_file_validates_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\ntable = \"1users\"").unwrap();

        assert!(matches!(
            Settings::load_from_file(file.path()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_load_from_file_rejects_huge_acquire_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nacquire_timeout_secs = 9223372036854775807").unwrap();

        assert!(matches!(
            Settings::load_from_file(file.path()),
            Err(Error::InvalidInput(_))
        ));
    }
}
