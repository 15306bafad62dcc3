use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use sqlx::{Executor, PgPool, SqlitePool};
use tracing::info;

use super::memory::{InMemorySubscriptionRepository, InMemoryUserRepository};
use super::postgres::{PostgresSubscriptionRepository, PostgresUserRepository};
use super::sqlite::{SqliteSubscriptionRepository, SqliteUserRepository};
use super::subscription_repository::SubscriptionRepository;
use super::user_repository::UserRepository;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The storage backend, selected once at startup from the database URL.
pub enum Database {
    Postgres(PgPool),
    Sqlite(SqlitePool),
    Memory,
}

impl Database {
    /// Connects and verifies the connection with a bounded ping.
    /// `postgres://` URLs select Postgres, `sqlite:` URLs select SQLite and
    /// the literal `memory` selects the in-memory store.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        if database_url.starts_with("postgres") {
            let pool = tokio::time::timeout(CONNECT_TIMEOUT, PgPool::connect(database_url))
                .await
                .context("timed out connecting to postgres")?
                .context("failed to connect to postgres")?;
            tokio::time::timeout(CONNECT_TIMEOUT, sqlx::query("SELECT 1").execute(&pool))
                .await
                .context("timed out pinging postgres")?
                .context("failed to ping postgres")?;
            info!("connected to postgres");
            Ok(Database::Postgres(pool))
        } else if database_url.starts_with("sqlite") {
            let pool = tokio::time::timeout(CONNECT_TIMEOUT, SqlitePool::connect(database_url))
                .await
                .context("timed out connecting to sqlite")?
                .context("failed to open sqlite database")?;
            tokio::time::timeout(CONNECT_TIMEOUT, sqlx::query("SELECT 1").execute(&pool))
                .await
                .context("timed out pinging sqlite")?
                .context("failed to ping sqlite")?;
            info!("connected to sqlite");
            Ok(Database::Sqlite(pool))
        } else if database_url == "memory" {
            info!("using in-memory store");
            Ok(Database::Memory)
        } else {
            bail!("unsupported database URL scheme: {database_url}");
        }
    }

    /// Applies `*.sql` files from `migrations_dir` in name order. Only the
    /// SQLite backend is migrated here; Postgres schemas are managed
    /// externally.
    pub async fn apply_sqlite_migrations(&self, migrations_dir: &Path) -> anyhow::Result<()> {
        let Database::Sqlite(pool) = self else {
            return Ok(());
        };
        let mut files: Vec<_> = std::fs::read_dir(migrations_dir)
            .with_context(|| format!("failed to read {}", migrations_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        files.sort();
        for file in files {
            info!(migration = %file.display(), "applying migration");
            let sql = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            pool.execute(sql.as_str())
                .await
                .with_context(|| format!("failed to execute {}", file.display()))?;
        }
        Ok(())
    }

    /// Builds the repository pair for the selected backend.
    pub fn repositories(&self) -> (Arc<dyn UserRepository>, Arc<dyn SubscriptionRepository>) {
        match self {
            Database::Postgres(pool) => (
                Arc::new(PostgresUserRepository { pool: pool.clone() }),
                Arc::new(PostgresSubscriptionRepository { pool: pool.clone() }),
            ),
            Database::Sqlite(pool) => (
                Arc::new(SqliteUserRepository { pool: pool.clone() }),
                Arc::new(SqliteSubscriptionRepository { pool: pool.clone() }),
            ),
            Database::Memory => (
                Arc::new(InMemoryUserRepository::new()),
                Arc::new(InMemorySubscriptionRepository::new()),
            ),
        }
    }
}
