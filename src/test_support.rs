//! Shared fixtures for unit tests: an in-memory ledger and fault-injecting
//! storage wrappers.

use argon2::Params;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{Order, PortfolioEntry, User, UserId, WalletTransaction};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::{
    LedgerStores, OrderRepository, PortfolioRepository, UserRepository, WalletRepository,
};
use crate::domain::services::{
    OrderExecutor, PortfolioLedger, StockCatalog, UserDirectory, UserLocks, WalletLedger,
};
use crate::domain::value_objects::{Money, Symbol};
use crate::persistence::{init_database, sqlite_stores, DatabaseConfig};

pub struct TestLedger {
    /// Unwrapped stores, for seeding and inspecting state behind any faults
    pub raw: LedgerStores,
    pub locks: UserLocks,
    pub catalog: Arc<StockCatalog>,
    pub wallet: Arc<WalletLedger>,
    pub portfolio: Arc<PortfolioLedger>,
    pub executor: Arc<OrderExecutor>,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::build(Duration::from_secs(5), |stores| stores).await
    }

    pub async fn with_lock_timeout(timeout: Duration) -> Self {
        Self::build(timeout, |stores| stores).await
    }

    pub async fn with_wallets<W, F>(wrap: F) -> Self
    where
        W: WalletRepository + 'static,
        F: FnOnce(Arc<dyn WalletRepository>) -> W,
    {
        Self::build(Duration::from_secs(5), |mut stores| {
            stores.wallets = Arc::new(wrap(stores.wallets.clone()));
            stores
        })
        .await
    }

    /// Services built over `wrap(raw stores)`
    pub async fn build(lock_timeout: Duration, wrap: impl FnOnce(LedgerStores) -> LedgerStores) -> Self {
        let pool = init_database(&DatabaseConfig::in_memory())
            .await
            .expect("in-memory database");
        let raw = sqlite_stores(pool);
        let stores = wrap(raw.clone());
        let locks = UserLocks::new(lock_timeout);

        let catalog = Arc::new(StockCatalog::new(stores.stocks.clone()));
        let wallet = Arc::new(WalletLedger::new(
            stores.users.clone(),
            stores.wallets.clone(),
            locks.clone(),
        ));
        let portfolio = Arc::new(PortfolioLedger::new(stores.portfolios.clone()));
        let executor = Arc::new(OrderExecutor::new(
            catalog.clone(),
            wallet.clone(),
            portfolio.clone(),
            stores.orders.clone(),
            locks.clone(),
        ));

        Self {
            raw,
            locks,
            catalog,
            wallet,
            portfolio,
            executor,
        }
    }

    /// Insert a user directly with an opening balance (not logged)
    pub async fn user_with_balance(&self, balance: f64) -> UserId {
        let user = User::new(
            "Test User".to_string(),
            format!("{}@example.com", uuid::Uuid::new_v4()),
            "unused".to_string(),
        );
        self.raw.users.insert(&user).await.unwrap();
        if balance > 0.0 {
            self.raw
                .users
                .credit_balance(user.id, Money::new(balance).unwrap())
                .await
                .unwrap();
        }
        user.id
    }

    /// List `<symbol> Corp` at `price`
    pub async fn stock(&self, symbol: &str, price: f64) -> Symbol {
        self.catalog
            .create(symbol, &format!("{} Corp", symbol), price)
            .await
            .unwrap()
            .symbol
    }

    /// Seed shares directly, bypassing the wallet
    pub async fn give_shares(&self, user: UserId, symbol: &str, quantity: i64) {
        self.raw
            .portfolios
            .adjust(user, &Symbol::parse(symbol).unwrap(), quantity)
            .await
            .unwrap();
    }

    pub async fn balance(&self, user: UserId) -> f64 {
        self.raw
            .users
            .find_by_id(user)
            .await
            .unwrap()
            .unwrap()
            .wallet_balance
            .value()
    }

    pub async fn holdings(&self, user: UserId, symbol: &str) -> i64 {
        self.raw
            .portfolios
            .find(user, &Symbol::parse(symbol).unwrap())
            .await
            .unwrap()
            .map_or(0, |e| e.quantity)
    }

    pub async fn orders(&self, user: UserId) -> Vec<Order> {
        self.raw.orders.list_for_user(user).await.unwrap()
    }

    pub async fn history(&self, user: UserId) -> Vec<WalletTransaction> {
        self.raw.wallets.history(user).await.unwrap()
    }
}

/// Directory over the ledger's users with the cheapest Argon2 settings
pub fn fast_directory(ledger: &TestLedger) -> UserDirectory {
    UserDirectory::with_params(
        ledger.raw.users.clone(),
        Params::new(Params::MIN_M_COST, 1, 1, None).unwrap(),
    )
}

/// Decides when an injected failure fires
pub struct Fault {
    passes_left: AtomicUsize,
}

impl Fault {
    pub fn never() -> Self {
        Self::after(usize::MAX)
    }

    pub fn always() -> Self {
        Self::after(0)
    }

    /// Let `n` calls through, then fail every call after
    pub fn after(n: usize) -> Self {
        Self {
            passes_left: AtomicUsize::new(n),
        }
    }

    fn check(&self, what: &str) -> LedgerResult<()> {
        let tripped = self
            .passes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                if left == 0 {
                    None
                } else if left == usize::MAX {
                    Some(left)
                } else {
                    Some(left - 1)
                }
            })
            .is_err();
        if tripped {
            Err(LedgerError::Internal(format!("injected failure: {}", what)))
        } else {
            Ok(())
        }
    }
}

pub struct FailingWallets {
    inner: Arc<dyn WalletRepository>,
    append: Fault,
}

impl FailingWallets {
    pub fn always(inner: Arc<dyn WalletRepository>) -> Self {
        Self {
            inner,
            append: Fault::always(),
        }
    }

    pub fn after(inner: Arc<dyn WalletRepository>, n: usize) -> Self {
        Self {
            inner,
            append: Fault::after(n),
        }
    }
}

#[async_trait]
impl WalletRepository for FailingWallets {
    async fn append(&self, entry: &WalletTransaction) -> LedgerResult<()> {
        self.append.check("wallet append")?;
        self.inner.append(entry).await
    }

    async fn history(&self, user: UserId) -> LedgerResult<Vec<WalletTransaction>> {
        self.inner.history(user).await
    }
}

pub struct FailingUsers {
    pub inner: Arc<dyn UserRepository>,
    pub credit: Fault,
    pub debit: Fault,
}

#[async_trait]
impl UserRepository for FailingUsers {
    async fn insert(&self, user: &User) -> LedgerResult<()> {
        self.inner.insert(user).await
    }

    async fn find_by_id(&self, id: UserId) -> LedgerResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> LedgerResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn list(&self) -> LedgerResult<Vec<User>> {
        self.inner.list().await
    }

    async fn credit_balance(&self, id: UserId, amount: Money) -> LedgerResult<Money> {
        self.credit.check("credit balance")?;
        self.inner.credit_balance(id, amount).await
    }

    async fn debit_balance(&self, id: UserId, amount: Money) -> LedgerResult<Money> {
        self.debit.check("debit balance")?;
        self.inner.debit_balance(id, amount).await
    }
}

pub struct FailingPortfolios {
    pub inner: Arc<dyn PortfolioRepository>,
    pub increase: Fault,
    pub decrease: Fault,
}

#[async_trait]
impl PortfolioRepository for FailingPortfolios {
    async fn find(&self, user: UserId, symbol: &Symbol) -> LedgerResult<Option<PortfolioEntry>> {
        self.inner.find(user, symbol).await
    }

    async fn adjust(&self, user: UserId, symbol: &Symbol, delta: i64) -> LedgerResult<i64> {
        if delta > 0 {
            self.increase.check("increase holding")?;
        } else if delta < 0 {
            self.decrease.check("decrease holding")?;
        }
        self.inner.adjust(user, symbol, delta).await
    }

    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<PortfolioEntry>> {
        self.inner.list_for_user(user).await
    }
}

pub struct FailingOrders {
    pub inner: Arc<dyn OrderRepository>,
    pub append: Fault,
}

#[async_trait]
impl OrderRepository for FailingOrders {
    async fn append(&self, order: &Order) -> LedgerResult<()> {
        self.append.check("order append")?;
        self.inner.append(order).await
    }

    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<Order>> {
        self.inner.list_for_user(user).await
    }
}

/// Holds every holdings adjustment for `delay` before applying it
pub struct SlowPortfolios {
    pub inner: Arc<dyn PortfolioRepository>,
    pub delay: Duration,
}

#[async_trait]
impl PortfolioRepository for SlowPortfolios {
    async fn find(&self, user: UserId, symbol: &Symbol) -> LedgerResult<Option<PortfolioEntry>> {
        self.inner.find(user, symbol).await
    }

    async fn adjust(&self, user: UserId, symbol: &Symbol, delta: i64) -> LedgerResult<i64> {
        tokio::time::sleep(self.delay).await;
        self.inner.adjust(user, symbol, delta).await
    }

    async fn list_for_user(&self, user: UserId) -> LedgerResult<Vec<PortfolioEntry>> {
        self.inner.list_for_user(user).await
    }
}

/// Holds every wallet log append for `delay` before writing it
pub struct SlowWallets {
    pub inner: Arc<dyn WalletRepository>,
    pub delay: Duration,
}

#[async_trait]
impl WalletRepository for SlowWallets {
    async fn append(&self, entry: &WalletTransaction) -> LedgerResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.append(entry).await
    }

    async fn history(&self, user: UserId) -> LedgerResult<Vec<WalletTransaction>> {
        self.inner.history(user).await
    }
}
