//! Database Repository
//!
//! SQLite implementations of the ledger storage ports.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::entities::{Order, PortfolioEntry, Stock, User, UserId, WalletTransaction};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::{
    OrderRepository, PortfolioRepository, StockRepository, UserRepository, WalletRepository,
};
use crate::domain::value_objects::{Money, Symbol};

fn query_failed(context: &str, e: sqlx::Error) -> LedgerError {
    error!("Failed to {}: {}", context, e);
    DatabaseError::QueryError(format!("Failed to {}: {}", context, e)).into()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn convert<R, T>(record: R) -> LedgerResult<T>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    T::try_from(record).map_err(|e| {
        error!("{}", e);
        LedgerError::from(e)
    })
}

fn convert_all<R, T>(records: Vec<R>) -> LedgerResult<Vec<T>>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    records.into_iter().map(convert).collect()
}

/// User repository
pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn current_balance(&self, id: UserId) -> LedgerResult<Option<f64>> {
        let balance: Option<(f64,)> =
            sqlx::query_as("SELECT wallet_balance FROM users WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_failed("read balance", e))?;
        Ok(balance.map(|(b,)| b))
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn insert(&self, user: &User) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, wallet_balance, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.wallet_balance.value())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::conflict("User", &user.email)
            } else {
                query_failed("create user", e)
            }
        })?;

        debug!("Created user: {}", user.id);
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> LedgerResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, wallet_balance, created_at FROM users WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get user", e))?;

        record.map(convert).transpose()
    }

    async fn find_by_email(&self, email: &str) -> LedgerResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, wallet_balance, created_at FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get user by email", e))?;

        record.map(convert).transpose()
    }

    async fn list(&self) -> LedgerResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, password_hash, wallet_balance, created_at FROM users ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list users", e))?;

        convert_all(records)
    }

    async fn credit_balance(&self, id: UserId, amount: Money) -> LedgerResult<Money> {
        // A sum that overflows to infinity fails the guard and writes nothing
        let balance: Option<(f64,)> = sqlx::query_as(
            r#"
            UPDATE users SET wallet_balance = wallet_balance + ?1
            WHERE id = ?2 AND wallet_balance + ?1 <= ?3
            RETURNING wallet_balance
            "#,
        )
        .bind(amount.value())
        .bind(id.to_string())
        .bind(f64::MAX)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("credit balance", e))?;

        match balance {
            Some((balance,)) => {
                debug!("Credited {:.2} to {}, balance {:.2}", amount.value(), id, balance);
                Money::new(balance).map_err(|e| LedgerError::Internal(e.to_string()))
            }
            None => match self.current_balance(id).await? {
                None => Err(LedgerError::not_found("User", id)),
                Some(current) => Err(LedgerError::InvalidInput(format!(
                    "crediting {} to balance {} exceeds the representable maximum",
                    amount.value(),
                    current
                ))),
            },
        }
    }

    async fn debit_balance(&self, id: UserId, amount: Money) -> LedgerResult<Money> {
        let balance: Option<(f64,)> = sqlx::query_as(
            r#"
            UPDATE users SET wallet_balance = wallet_balance - ?1
            WHERE id = ?2 AND wallet_balance >= ?1
            RETURNING wallet_balance
            "#,
        )
        .bind(amount.value())
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("debit balance", e))?;

        match balance {
            Some((balance,)) => {
                debug!("Debited {:.2} from {}, balance {:.2}", amount.value(), id, balance);
                Money::new(balance).map_err(|e| LedgerError::Internal(e.to_string()))
            }
            None => match self.current_balance(id).await? {
                None => Err(LedgerError::not_found("User", id)),
                Some(available) => Err(LedgerError::InsufficientFunds {
                    required: amount.value(),
                    available,
                }),
            },
        }
    }
}

/// Wallet log repository
pub struct SqliteWalletRepository {
    pool: DbPool,
}

impl SqliteWalletRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn append(&self, entry: &WalletTransaction) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, user_id, method, amount, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.to_string())
        .bind(entry.method.as_str())
        .bind(entry.amount)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("append wallet transaction", e))?;

        debug!("Logged {} of {:.2} for {}", entry.method, entry.amount, entry.user_id);
        Ok(())
    }

    async fn history(&self, user: UserId) -> LedgerResult<Vec<WalletTransaction>> {
        let records = sqlx::query_as::<_, WalletTransactionRecord>(
            r#"
            SELECT id, user_id, method, amount, created_at
            FROM wallet_transactions WHERE user_id = ?1 ORDER BY seq
            "#,
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("get wallet history", e))?;

        convert_all(records)
    }
}

/// Stock catalog repository
pub struct SqliteStockRepository {
    pool: DbPool,
}

impl SqliteStockRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockRepository for SqliteStockRepository {
    async fn insert(&self, stock: &Stock) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stocks (id, symbol, name, price, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(stock.id.to_string())
        .bind(stock.symbol.as_str())
        .bind(&stock.name)
        .bind(stock.price.value())
        .bind(stock.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::conflict("Stock", &stock.symbol)
            } else {
                query_failed("create stock", e)
            }
        })?;

        debug!("Created stock: {} at {}", stock.symbol, stock.price.value());
        Ok(())
    }

    async fn find_by_symbol(&self, symbol: &Symbol) -> LedgerResult<Option<Stock>> {
        let record = sqlx::query_as::<_, StockRecord>(
            "SELECT id, symbol, name, price, created_at FROM stocks WHERE symbol = ?1",
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get stock", e))?;

        record.map(convert).transpose()
    }

    async fn list(&self) -> LedgerResult<Vec<Stock>> {
        let records = sqlx::query_as::<_, StockRecord>(
            "SELECT id, symbol, name, price, created_at FROM stocks ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list stocks", e))?;

        convert_all(records)
    }
}

/// Holdings repository
pub struct SqlitePortfolioRepository {
    pool: DbPool,
}

impl SqlitePortfolioRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn quantity(&self, user: UserId, symbol: &Symbol) -> LedgerResult<i64> {
        Ok(self.find(user, symbol).await?.map_or(0, |entry| entry.quantity))
    }

    async fn increase(&self, user: UserId, symbol: &Symbol, delta: i64) -> LedgerResult<i64> {
        let (quantity,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO portfolio (user_id, symbol, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, symbol)
            DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
            RETURNING quantity
            "#,
        )
        .bind(user.to_string())
        .bind(symbol.as_str())
        .bind(delta)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| query_failed("increase holding", e))?;

        Ok(quantity)
    }

    async fn decrease(&self, user: UserId, symbol: &Symbol, delta: i64) -> LedgerResult<i64> {
        let quantity: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE portfolio SET quantity = quantity + ?1, updated_at = ?2
            WHERE user_id = ?3 AND symbol = ?4 AND quantity + ?1 >= 0
            RETURNING quantity
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(user.to_string())
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("decrease holding", e))?;

        match quantity {
            Some((quantity,)) => Ok(quantity),
            None => Err(LedgerError::InsufficientHoldings {
                symbol: symbol.to_string(),
                requested: -delta,
                held: self.quantity(user, symbol).await?,
            }),
        }
    }
}

#[async_trait]
impl PortfolioRepository for SqlitePortfolioRepository {
    async fn find(&self, user: UserId, symbol: &Symbol) -> LedgerResult<Option<PortfolioEntry>> {
        let record = sqlx::query_as::<_, PortfolioRecord>(
            "SELECT user_id, symbol, quantity FROM portfolio WHERE user_id = ?1 AND symbol = ?2",
        )
        .bind(user.to_string())
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get holding", e))?;

        record.map(convert).transpose()
    }

    async fn adjust(&self, user: UserId, symbol: &Symbol, delta: i64) -> LedgerResult<i64> {
        let quantity = match delta {
            0 => self.quantity(user, symbol).await?,
            d if d > 0 => self.increase(user, symbol, d).await?,
            d => self.decrease(user, symbol, d).await?,
        };

        debug!("Adjusted {} holding of {} by {}, now {}", symbol, user, delta, quantity);
        Ok(quantity)
    }

    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<PortfolioEntry>> {
        let records = sqlx::query_as::<_, PortfolioRecord>(
            "SELECT user_id, symbol, quantity FROM portfolio WHERE user_id = ?1 ORDER BY symbol",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list holdings", e))?;

        convert_all(records)
    }
}

/// Order log repository
pub struct SqliteOrderRepository {
    pool: DbPool,
}

impl SqliteOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn append(&self, order: &Order) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, symbol, side, quantity, price, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(order.id.to_string())
        .bind(order.user_id.to_string())
        .bind(order.symbol.as_str())
        .bind(order.side.as_str())
        .bind(order.quantity.value())
        .bind(order.price.value())
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("append order", e))?;

        debug!("Logged order {}: {} {} {}", order.id, order.side, order.quantity.value(), order.symbol);
        Ok(())
    }

    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT id, user_id, symbol, side, quantity, price, created_at
            FROM orders WHERE user_id = ?1 ORDER BY seq
            "#,
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list orders", e))?;

        convert_all(records)
    }
}
