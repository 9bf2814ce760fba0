//! Database handle for Synk
//!
//! Owns the SQLite pool, runs migrations on open and bounds every store call
//! by a deadline.

use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::time::Instant;

use crate::config::DatabaseConfig;
use crate::error::{Result, StoreError, SynkError};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    default_timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.size())
            .field("default_timeout", &self.default_timeout)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the database file at `db_path`
    pub async fn new(db_path: &str) -> Result<Self> {
        let mut config = crate::Config::default_config().database;
        config.path = db_path.to_string();
        Self::open(&config).await
    }

    /// Open the database described by `config`
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let expanded_path = shellexpand::tilde(&config.path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::Io)?;
            }
        }

        // Forward slashes keep the URL valid on Windows too
        let db_url = format!("sqlite://{}", expanded_path.replace('\\', "/"));
        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::info!("Database opened at {}", expanded_path);
        Self::from_pool(pool, config.statement_timeout()).await
    }

    /// Private in-memory database, used by tests
    ///
    /// A single connection keeps every query on the same memory instance.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool, None).await
    }

    async fn from_pool(pool: SqlitePool, default_timeout: Option<Duration>) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::Migration)?;

        Ok(Self {
            pool,
            default_timeout,
            deadline: None,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A handle sharing this pool whose calls must finish before `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            pool: self.pool.clone(),
            default_timeout: self.default_timeout,
            deadline: Some(deadline),
        }
    }

    /// A handle sharing this pool with a different default per-call timeout
    pub fn with_default_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            pool: self.pool.clone(),
            default_timeout: timeout,
            deadline: self.deadline,
        }
    }

    /// Run one store operation under the active deadline
    ///
    /// An explicit deadline wins over the default timeout. On expiry the
    /// future is dropped, which rolls back any transaction it holds open.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = match (self.deadline, self.default_timeout) {
            (Some(deadline), _) => deadline,
            (None, Some(timeout)) => Instant::now() + timeout,
            (None, None) => return fut.await,
        };

        let now = Instant::now();
        let limit_ms = deadline.saturating_duration_since(now).as_millis() as u64;

        // An already expired deadline must not start any work
        if deadline <= now {
            tracing::warn!(operation, "store call started after its deadline");
            return Err(SynkError::Timeout {
                operation,
                limit_ms,
            });
        }

        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, limit_ms, "store call exceeded its deadline");
                Err(SynkError::Timeout {
                    operation,
                    limit_ms,
                })
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Current time as Unix seconds, the timestamp format of every table
pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
