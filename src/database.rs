//! SQLite connection management for the trace store.
//!
//! Functional core / imperative shell split, same as the teacher: configuration
//! validation and connect-option construction are pure; opening the pool, creating
//! the parent directory, applying PRAGMA tuning, and running migrations are the
//! imperative shell.

use nutype::nutype;
use sqlx::{Pool, Sqlite, SqlitePool, migrate::Migrator};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::TraceStoreError;

static MIGRATOR: Migrator = sqlx::migrate!();

/// A filesystem path to a SQLite database file, required to end in `.db`.
#[nutype(
    sanitize(with = |path: PathBuf| path),
    validate(predicate = |path| !path.as_os_str().is_empty() && path.extension().is_some_and(|ext| ext == "db")),
    derive(Clone, Debug, Eq, PartialEq)
)]
pub struct DatabasePath(PathBuf);

impl DatabasePath {
    /// Creates a validated database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or does not end in `.db`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TraceStoreError> {
        Self::try_new(path.as_ref().to_path_buf()).map_err(|_| TraceStoreError::Database {
            source: sqlx::Error::Configuration(
                "database path must be non-empty and end in .db".into(),
            ),
        })
    }

    #[must_use]
    pub fn as_path(&self) -> PathBuf {
        self.clone().into_inner()
    }

    #[must_use]
    pub fn parent_directory(&self) -> Option<PathBuf> {
        self.as_path().parent().map(Path::to_path_buf)
    }
}

impl std::fmt::Display for DatabasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_path().display())
    }
}

/// Configuration for the trace store's SQLite connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    path: DatabasePath,
    pool_size: u32,
    enable_wal_mode: bool,
    enable_foreign_keys: bool,
}

impl DatabaseConfig {
    #[must_use]
    pub fn new(path: DatabasePath) -> Self {
        Self {
            path,
            pool_size: 8,
            enable_wal_mode: true,
            enable_foreign_keys: true,
        }
    }

    /// A minimal, WAL-disabled configuration suited to `tempfile`-backed tests.
    #[must_use]
    pub fn for_testing(path: DatabasePath) -> Self {
        Self {
            path,
            pool_size: 1,
            enable_wal_mode: false,
            enable_foreign_keys: false,
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn path(&self) -> &DatabasePath {
        &self.path
    }
}

/// A live connection pool to the trace store's SQLite database.
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: Pool<Sqlite>,
}

impl DatabaseConnection {
    fn create_connect_options(config: &DatabaseConfig) -> sqlx::sqlite::SqliteConnectOptions {
        use sqlx::ConnectOptions;
        use sqlx::sqlite::SqliteConnectOptions;

        let mut options = SqliteConnectOptions::new()
            .filename(config.path().as_path())
            .create_if_missing(true);

        if config.enable_wal_mode {
            options = options.pragma("journal_mode", "WAL");
        }
        if config.enable_foreign_keys {
            options = options.pragma("foreign_keys", "ON");
        }

        options.disable_statement_logging()
    }

    /// Opens the pool, ensures the parent directory exists, tunes the database
    /// for low-latency append/read, and runs embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the pool cannot
    /// be opened, or a migration fails.
    pub async fn initialize(config: DatabaseConfig) -> Result<Self, TraceStoreError> {
        if let Some(parent) = config.path().parent_directory() {
            tokio::fs::create_dir_all(&parent).await?;
        }

        let options = Self::create_connect_options(&config);
        let pool = SqlitePool::connect_with(options).await?;

        Self::apply_performance_settings(&pool).await?;
        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn apply_performance_settings(pool: &Pool<Sqlite>) -> Result<(), TraceStoreError> {
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(pool)
            .await?;
        sqlx::query("PRAGMA cache_size = -65536")
            .execute(pool)
            .await?;
        sqlx::query("PRAGMA temp_store = MEMORY")
            .execute(pool)
            .await?;
        sqlx::query("PRAGMA mmap_size = 268435456")
            .execute(pool)
            .await?;
        sqlx::query("PRAGMA optimize").execute(pool).await?;
        Ok(())
    }

    async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), TraceStoreError> {
        info!("running trace store migrations");
        match MIGRATOR.run(pool).await {
            Ok(()) => {
                info!("trace store migrations complete");
                Ok(())
            }
            Err(source) => {
                warn!("trace store migration failed: {source}");
                Err(TraceStoreError::Migration { source })
            }
        }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_should_reject_path_without_db_extension() {
        assert!(DatabasePath::new("/tmp/trace.sqlite").is_err());
    }

    #[test]
    fn test_should_accept_path_with_db_extension() {
        assert!(DatabasePath::new("/tmp/trace.db").is_ok());
    }

    #[tokio::test]
    async fn test_should_initialize_and_run_migrations() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = DatabasePath::new(temp_dir.path().join("trace.db")).expect("valid path");
        let config = DatabaseConfig::for_testing(path);

        let connection = DatabaseConnection::initialize(config).await;
        assert!(connection.is_ok(), "initialize should succeed");

        let connection = connection.unwrap();
        let row: (String,) = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='trace_envelopes'",
        )
        .fetch_one(connection.pool())
        .await
        .expect("trace_envelopes table should exist after migration");
        assert_eq!(row.0, "trace_envelopes");
    }
}
