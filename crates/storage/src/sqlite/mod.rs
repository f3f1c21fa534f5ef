use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{ProgressRepository, Storage};

mod mapping;
mod migrate;
mod progress_repo;

/// Progress store backed by a `SQLite` pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// How a database URL maps onto connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    /// A file, or a named in-memory database shared across connections.
    Shared,
    /// An in-memory database only the opening connection can see.
    Private,
}

impl Backing {
    fn of(database_url: &str) -> Self {
        let private_memory = database_url == "sqlite::memory:"
            || (database_url.contains("mode=memory") && !database_url.contains("cache=shared"));
        if private_memory {
            Self::Private
        } else {
            Self::Shared
        }
    }

    /// A private database lives exactly as long as its one connection, so the
    /// pool holds a single connection and never recycles it.
    fn pool_options(self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(5));
        match self {
            Self::Shared => options.max_connections(5),
            Self::Private => options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }

    fn journal_pragma(self) -> &'static str {
        match self {
            Self::Shared => "PRAGMA journal_mode = WAL;",
            Self::Private => "PRAGMA journal_mode = MEMORY;",
        }
    }
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// `sqlite::memory:` and other unshared in-memory URLs get a single
    /// connection, so every query sees the same (migrated) database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// the connection pragmas fail.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let backing = Backing::of(database_url);
        let journal = backing.journal_pragma();
        let pool = backing
            .pool_options()
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query(journal).execute(&mut *conn).await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        tracing::debug!(database_url, ?backing, "connected to sqlite");
        Ok(Self { pool })
    }

    /// Apply pending schema versions.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Open and migrate a `SQLite` progress store.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self { progress })
    }
}
