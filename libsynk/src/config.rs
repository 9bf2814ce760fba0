//! Configuration management for Synk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

const DEFAULT_DB_PATH: &str = "~/.local/share/synk/synk.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a connection waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Default deadline for a single store call when the caller sets none
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error: the defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: DEFAULT_DB_PATH.to_string(),
                max_connections: default_max_connections(),
                busy_timeout_ms: default_busy_timeout_ms(),
                statement_timeout_ms: Some(10_000),
            },
        }
    }

    /// Configuration for a database file at `path`, everything else default
    pub fn with_database_path(path: impl Into<String>) -> Self {
        let mut config = Self::default_config();
        config.database.path = path.into();
        config
    }
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNK_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("synk").join("config.toml"))
}

/// Resolve the database path
///
/// Priority: `SYNK_DB_PATH`, then the configured path, then the default.
/// `~` is expanded in every case.
pub fn resolve_db_path(configured: Option<&str>) -> Result<PathBuf> {
    let raw = std::env::var("SYNK_DB_PATH")
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    if raw.trim().is_empty() {
        return Err(ConfigError::MissingField("database.path".to_string()).into());
    }

    Ok(PathBuf::from(shellexpand::tilde(&raw).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
[database]
path = "/tmp/synk.db"
"#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/tmp/synk.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.database.statement_timeout(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
[database]
path = "~/synk.db"
max_connections = 2
busy_timeout_ms = 100
statement_timeout_ms = 750
"#,
        )
        .unwrap();

        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.busy_timeout_ms, 100);
        assert_eq!(
            config.database.statement_timeout(),
            Some(Duration::from_millis(750))
        );
    }

    #[test]
    fn test_parse_missing_database_section_fails() {
        let result = Config::from_toml("[other]\nkey = 1\n");
        assert!(matches!(
            result,
            Err(crate::SynkError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_load_from_missing_path_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load_from_path(&temp_dir.path().join("nope.toml"));
        assert!(matches!(
            result,
            Err(crate::SynkError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_load_falls_back_to_defaults_when_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("SYNK_CONFIG", temp_dir.path().join("absent.toml"));

        let config = Config::load().unwrap();
        assert_eq!(config.database.path, DEFAULT_DB_PATH);

        std::env::remove_var("SYNK_CONFIG");
    }

    #[test]
    #[serial]
    fn test_load_reads_file_named_by_env() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[database]\npath = \"/srv/synk.db\"\n").unwrap();
        std::env::set_var("SYNK_CONFIG", &path);

        let config = Config::load().unwrap();
        assert_eq!(config.database.path, "/srv/synk.db");

        std::env::remove_var("SYNK_CONFIG");
    }

    #[test]
    #[serial]
    fn test_resolve_db_path_env_override() {
        std::env::set_var("SYNK_DB_PATH", "/var/lib/synk/override.db");
        let path = resolve_db_path(Some("/ignored.db")).unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/synk/override.db"));
        std::env::remove_var("SYNK_DB_PATH");

        let path = resolve_db_path(Some("/configured.db")).unwrap();
        assert_eq!(path, PathBuf::from("/configured.db"));
    }

    #[test]
    #[serial]
    fn test_resolve_db_path_expands_tilde() {
        std::env::remove_var("SYNK_DB_PATH");
        let path = resolve_db_path(None).unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("synk/synk.db"));
    }

    #[test]
    #[serial]
    fn test_resolve_db_path_rejects_blank() {
        std::env::remove_var("SYNK_DB_PATH");
        assert!(resolve_db_path(Some("   ")).is_err());
    }
}
