//! # Connection Pool
//!
//! Opens the SQLite file every engine shares and hands out repositories.
//!
//! Each connection runs in WAL mode with foreign keys on, so readers never
//! wait on the writer. Writers are serialized by SQLite: a second writer
//! waits up to `busy_timeout`, and an engine whose transaction still comes
//! back busy is retried by its [`RetryPolicy`].
//!
//! ```text
//!   EngineConfig::db_config()  or  DbConfig::new(path)
//!              │
//!              ▼
//!   Database::new ──► SqlitePool (max_connections) ──► migrations
//!              │
//!              ├─ orders()        ─┐
//!              ├─ reservations()   ├─ share the pool and the retry policy
//!              └─ registrations() ─┘
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::order::OrderRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::registration::RegistrationRepository;
use crate::repository::report::ReportRepository;
use crate::repository::reservation::ReservationRepository;
use crate::retry::RetryPolicy;

const MEMORY_PATH: &str = ":memory:";

/// How to open the database.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/mise/mise.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// Longest wait for a free pooled connection.
    pub acquire_timeout: Duration,
    /// Longest wait on a SQLite write lock before the statement fails busy.
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
    pub migrate_on_connect: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            migrate_on_connect: true,
        }
    }

    /// A private in-memory database. Every connection to `:memory:` is a
    /// separate database, so the pool is pinned to one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn migrate_on_connect(mut self, migrate: bool) -> Self {
        self.migrate_on_connect = migrate;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        // WAL needs a real file.
        Ok(if self.is_in_memory() {
            options
        } else {
            options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        })
    }
}

/// Shared handle to the pool. Clones share the same connections.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl Database {
    /// Opens (creating if needed) the database and, unless disabled,
    /// brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening database");

        let options = config.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout = ?config.busy_timeout,
            "Pool ready"
        );

        let db = Database {
            pool,
            retry: config.retry,
        };
        if config.migrate_on_connect {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Restaurants, tables and menu items.
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone(), self.retry)
    }

    /// Ingredient stock levels.
    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone(), self.retry)
    }

    /// Menu item bills of materials.
    pub fn recipes(&self) -> RecipeRepository {
        RecipeRepository::new(self.pool.clone(), self.retry)
    }

    /// Order engine.
    ///
    /// ```rust,ignore
    /// let line = db.orders().add_item(&order_id, &burger_id, 2).await?;
    /// let receipt = db.orders().pay_order(&order_id).await?;
    /// ```
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone(), self.retry)
    }

    /// Reservation scheduler.
    pub fn reservations(&self) -> ReservationRepository {
        ReservationRepository::new(self.pool.clone(), self.retry)
    }

    /// Events and the capacity allocator.
    pub fn registrations(&self) -> RegistrationRepository {
        RegistrationRepository::new(self.pool.clone(), self.retry)
    }

    /// Sales reports.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Closes every connection. Later queries fail.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// `true` when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = DbConfig::new("/tmp/mise.db")
            .max_connections(10)
            .busy_timeout(Duration::from_millis(250))
            .retry(RetryPolicy::no_retry())
            .migrate_on_connect(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 1);
        assert!(!config.migrate_on_connect);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn in_memory_uses_one_connection() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);
        assert!(config.migrate_on_connect);
    }

    #[tokio::test]
    async fn closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }
}
