//! Persistence Layer
//!
//! SQLite storage for the ledger ports, with async operations via sqlx.
//!
//! # Database Schema
//!
//! ## users
//! - id: UUID, email (unique), name, password_hash
//! - wallet_balance: REAL, `CHECK(wallet_balance >= 0)`
//!
//! ## wallet_transactions
//! - seq: insertion order, id: UUID, user_id, method, amount, created_at
//!
//! ## stocks
//! - seq, id: UUID, symbol (unique), name, price `CHECK(price > 0)`
//!
//! ## portfolio
//! - (user_id, symbol) unique, quantity `CHECK(quantity >= 0)`
//!
//! ## orders
//! - seq, id: UUID, user_id, symbol, side, quantity, price, created_at
//!
//! No statement spans two tables. Balance debits and holding decrements are
//! conditional updates, so the non-negativity floor is enforced by the store
//! itself and not only by the application's per-user lock.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::domain::errors::LedgerError;
use crate::domain::repositories::LedgerStores;
use repository::{
    SqliteOrderRepository, SqlitePortfolioRepository, SqliteStockRepository,
    SqliteUserRepository, SqliteWalletRepository,
};

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<DatabaseError> for LedgerError {
    fn from(error: DatabaseError) -> Self {
        LedgerError::Internal(error.to_string())
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/tradewallet.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Upper bound on waiting for a pooled connection
    pub acquire_timeout: Duration,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/tradewallet.db".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Private in-memory database, used by tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            log_queries: false,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Initialize the database connection pool and bootstrap the schema
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let level = if config.log_queries {
        tracing::log::LevelFilter::Debug
    } else {
        tracing::log::LevelFilter::Trace
    };
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .log_statements(level);

    // Every connection to ":memory:" opens its own database, so the pool must
    // keep exactly one connection alive for the lifetime of the pool.
    let pool_options = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    let pool = pool_options
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Build every ledger port over one pool
pub fn sqlite_stores(pool: DbPool) -> LedgerStores {
    LedgerStores {
        users: Arc::new(SqliteUserRepository::new(pool.clone())),
        wallets: Arc::new(SqliteWalletRepository::new(pool.clone())),
        stocks: Arc::new(SqliteStockRepository::new(pool.clone())),
        portfolios: Arc::new(SqlitePortfolioRepository::new(pool.clone())),
        orders: Arc::new(SqliteOrderRepository::new(pool)),
    }
}

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            wallet_balance REAL NOT NULL DEFAULT 0 CHECK(wallet_balance >= 0),
            created_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "wallet_transactions",
        r#"
        CREATE TABLE IF NOT EXISTS wallet_transactions (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            method TEXT NOT NULL CHECK(method IN ('deposit', 'withdraw', 'trade-settlement')),
            amount REAL NOT NULL,
            created_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "stocks",
        r#"
        CREATE TABLE IF NOT EXISTS stocks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            symbol TEXT NOT NULL,
            name TEXT NOT NULL,
            price REAL NOT NULL CHECK(price > 0),
            created_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "portfolio",
        r#"
        CREATE TABLE IF NOT EXISTS portfolio (
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK(quantity >= 0),
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "orders",
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            side TEXT NOT NULL CHECK(side IN ('BUY', 'SELL')),
            quantity INTEGER NOT NULL CHECK(quantity > 0),
            price REAL NOT NULL CHECK(price > 0),
            created_at DATETIME NOT NULL
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_stocks_symbol ON stocks(symbol)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_portfolio_user_symbol ON portfolio(user_id, symbol)",
    "CREATE INDEX IF NOT EXISTS idx_wallet_transactions_user ON wallet_transactions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)",
];

/// Create tables and indexes if they do not exist yet
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    for (table, ddl) in SCHEMA {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            error!("Failed to create {} table: {}", table, e);
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", table, e))
        })?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database(&DatabaseConfig::in_memory()).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('users', 'wallet_transactions', 'stocks', 'portfolio', 'orders')"
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 5);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_unique_indexes_exist() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name IN ('idx_users_email', 'idx_stocks_symbol', 'idx_portfolio_user_symbol')"
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 3);
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/tradewallet.db");
        assert_eq!(config.max_connections, 5);
        assert!(!config.is_in_memory());
        assert!(DatabaseConfig::in_memory().is_in_memory());
    }
}
