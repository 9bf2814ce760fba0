//! Error types for Synk

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynkError>;

#[derive(Error, Debug)]
pub enum SynkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Operation '{operation}' timed out after {limit_ms}ms")]
    Timeout { operation: &'static str, limit_ms: u64 },
}

impl SynkError {
    /// Shorthand for a caller-fixable validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        SynkError::Validation(message.into())
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SynkError::Validation(_) => 3,
            SynkError::Timeout { .. } => 4,
            SynkError::Config(_) => 1,
            SynkError::Store(_) => 1,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_transient(&self) -> bool {
        matches!(self, SynkError::Store(_) | SynkError::Timeout { .. })
    }
}

impl From<sqlx::Error> for SynkError {
    fn from(err: sqlx::Error) -> Self {
        SynkError::Store(StoreError::Sqlx(err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database operation failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_validation() {
        let error = SynkError::validation("name is required");
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_timeout() {
        let error = SynkError::Timeout {
            operation: "posts.list",
            limit_ms: 250,
        };
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn test_exit_code_store_and_config() {
        let store = SynkError::Store(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        )));
        assert_eq!(store.exit_code(), 1);

        let config = SynkError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(config.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting_validation() {
        let error = SynkError::validation("template with id 9 not found");
        assert_eq!(
            format!("{}", error),
            "Validation failed: template with id 9 not found"
        );
    }

    #[test]
    fn test_error_message_formatting_timeout() {
        let error = SynkError::Timeout {
            operation: "profiles.update",
            limit_ms: 1500,
        };
        assert_eq!(
            format!("{}", error),
            "Operation 'profiles.update' timed out after 1500ms"
        );
    }

    #[test]
    fn test_error_message_formatting_config() {
        let error = SynkError::Config(ConfigError::MissingField("config directory".to_string()));
        assert_eq!(
            format!("{}", error),
            "Configuration error: Missing required field: config directory"
        );
    }

    #[test]
    fn test_sqlx_error_converts_to_store() {
        let error: SynkError = sqlx::Error::RowNotFound.into();
        match error {
            SynkError::Store(StoreError::Sqlx(sqlx::Error::RowNotFound)) => {}
            other => panic!("Expected StoreError::Sqlx, got {:?}", other),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(SynkError::Timeout {
            operation: "x",
            limit_ms: 1
        }
        .is_transient());
        assert!(SynkError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!SynkError::validation("bad").is_transient());
        assert!(!SynkError::Config(ConfigError::MissingField("x".into())).is_transient());
    }
}
