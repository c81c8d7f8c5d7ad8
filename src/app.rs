//! Service wiring shared by the binary and the HTTP tests

use std::sync::Arc;

use crate::auth::ApiKeys;
use crate::config::AppConfig;
use crate::domain::repositories::LedgerStores;
use crate::domain::services::{
    OrderExecutor, PortfolioLedger, StockCatalog, UserDirectory, UserLocks, WalletLedger,
};
use crate::persistence::{init_database, sqlite_stores, DatabaseError};
use crate::rate_limit::{create_rate_limiter, GlobalRateLimiter};

/// Every service, built over one set of stores and one lock table
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<UserDirectory>,
    pub catalog: Arc<StockCatalog>,
    pub wallet: Arc<WalletLedger>,
    pub portfolio: Arc<PortfolioLedger>,
    pub executor: Arc<OrderExecutor>,
    pub api_keys: ApiKeys,
    pub limiter: GlobalRateLimiter,
}

impl AppState {
    /// Open the configured database and build the services over it
    pub async fn connect(config: &AppConfig) -> Result<Self, DatabaseError> {
        let pool = init_database(&config.database).await?;
        Ok(Self::from_stores(sqlite_stores(pool), config))
    }

    pub fn from_stores(stores: LedgerStores, config: &AppConfig) -> Self {
        Self::with_directory(
            UserDirectory::new(stores.users.clone()),
            stores,
            config,
        )
    }

    /// Like `from_stores`, with a caller-supplied directory (e.g. cheaper
    /// password hashing parameters)
    pub fn with_directory(directory: UserDirectory, stores: LedgerStores, config: &AppConfig) -> Self {
        let locks = UserLocks::new(config.lock_timeout);
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
            locks,
        ));

        Self {
            directory: Arc::new(directory),
            catalog,
            wallet,
            portfolio,
            executor,
            api_keys: ApiKeys::new(config.api_keys.iter().cloned()),
            limiter: create_rate_limiter(config.requests_per_minute),
        }
    }
}
