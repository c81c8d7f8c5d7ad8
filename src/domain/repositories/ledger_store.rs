//! Ledger storage ports
//!
//! Each aggregate (user balance, wallet log, catalog, holdings, order log) is
//! stored independently. Every method below is atomic on the single record it
//! touches and nothing more: the store offers no transaction spanning two
//! ports. Multi-aggregate consistency is the job of the services layer.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::entities::{Order, PortfolioEntry, Stock, User, UserId, WalletTransaction};
use crate::domain::errors::LedgerResult;
use crate::domain::value_objects::{Money, Symbol};

/// Account records and their cash balance
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. `Conflict` if the email is already registered.
    async fn insert(&self, user: &User) -> LedgerResult<()>;

    async fn find_by_id(&self, id: UserId) -> LedgerResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> LedgerResult<Option<User>>;

    async fn list(&self) -> LedgerResult<Vec<User>>;

    /// Atomically add `amount` to the balance and return the new balance.
    /// `NotFound` if the user does not exist.
    async fn credit_balance(&self, id: UserId, amount: Money) -> LedgerResult<Money>;

    /// Atomically subtract `amount` if the balance covers it and return the
    /// new balance. `InsufficientFunds` leaves the balance untouched.
    async fn debit_balance(&self, id: UserId, amount: Money) -> LedgerResult<Money>;
}

/// Append-only wallet transaction log
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn append(&self, entry: &WalletTransaction) -> LedgerResult<()>;

    /// Entries for `user` in creation order
    async fn history(&self, user: UserId) -> LedgerResult<Vec<WalletTransaction>>;
}

#[async_trait]
pub trait StockRepository: Send + Sync {
    /// `Conflict` if the symbol already exists
    async fn insert(&self, stock: &Stock) -> LedgerResult<()>;

    async fn find_by_symbol(&self, symbol: &Symbol) -> LedgerResult<Option<Stock>>;

    /// All stocks in creation order
    async fn list(&self) -> LedgerResult<Vec<Stock>>;
}

/// Per-(user, symbol) holding quantities
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    async fn find(&self, user: UserId, symbol: &Symbol) -> LedgerResult<Option<PortfolioEntry>>;

    /// Atomically apply `delta` and return the new quantity, creating the
    /// entry on first acquisition. `InsufficientHoldings` if the result would
    /// go negative; the stored quantity is then left untouched.
    async fn adjust(&self, user: UserId, symbol: &Symbol, delta: i64) -> LedgerResult<i64>;

    /// Entries for `user` ordered by symbol
    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<PortfolioEntry>>;
}

/// Append-only order log
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn append(&self, order: &Order) -> LedgerResult<()>;

    /// Orders for `user` in acceptance order
    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<Order>>;
}

/// One handle per storage port
#[derive(Clone)]
pub struct LedgerStores {
    pub users: Arc<dyn UserRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub stocks: Arc<dyn StockRepository>,
    pub portfolios: Arc<dyn PortfolioRepository>,
    pub orders: Arc<dyn OrderRepository>,
}
