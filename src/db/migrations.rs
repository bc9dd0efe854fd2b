//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::{Connection, SqliteConnection};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::{COUNT_TABLE, Database, TASK_COUNT_KEY, TASKS_TABLE};

impl Database {
    /// Open (or create) the database at `path`
    ///
    /// Creates the parent directory and the file if missing, then runs
    /// migrations. This is the only place containers are created.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // WAL + synchronous=FULL: a committed write survives a crash
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self {
            pool,
            counter_lock: tokio::sync::Mutex::new(()),
        };

        db.run_migrations().await?;

        tracing::info!(db_path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: counter and task tables
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        // Rolled back on error or drop, so a partial migration never sticks
        let mut tx = conn.begin_with("BEGIN IMMEDIATE").await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        Self::create_count_table(&mut *tx).await?;
        Self::create_tasks_table(&mut *tx).await?;
        Self::record_migration(&mut *tx, 1).await?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to commit migration v1: {}",
                e
            )))
        })?;

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    /// Create the counter table and seed the counter with zero if it is absent
    async fn create_count_table(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {COUNT_TABLE} (key TEXT PRIMARY KEY, value BLOB NOT NULL)"
        ))
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create count table: {}",
                e
            )))
        })?;

        // Never overwrite an existing counter: ids must not be reissued
        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {COUNT_TABLE} (key, value) VALUES (?, ?)"
        ))
        .bind(TASK_COUNT_KEY)
        .bind(0u32.to_be_bytes().to_vec())
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to seed task counter: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Create the task record table
    async fn create_tasks_table(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {TASKS_TABLE} (id TEXT PRIMARY KEY, data TEXT NOT NULL)"
        ))
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create tasks table: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Record an applied migration version
    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;

        Ok(())
    }

    /// Close the connection pool
    ///
    /// Subsequent queries fail with a store error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map a query failure, reporting a missing table as a missing container
pub(super) fn query_error(context: &str, e: sqlx::Error) -> Error {
    let message = e.to_string();
    if message.contains("no such table") {
        Error::Database(DatabaseError::MissingContainer(format!(
            "{}: {}",
            context, message
        )))
    } else {
        Error::Database(DatabaseError::QueryFailed(format!(
            "{}: {}",
            context, message
        )))
    }
}
