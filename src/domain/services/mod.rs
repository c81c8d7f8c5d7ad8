pub mod order_executor;
pub mod portfolio_ledger;
pub mod stock_catalog;
pub mod user_directory;
pub mod user_lock;
pub mod wallet_ledger;

pub use order_executor::{ExecutionStage, OrderExecutor};
pub use portfolio_ledger::PortfolioLedger;
pub use stock_catalog::StockCatalog;
pub use user_directory::UserDirectory;
pub use user_lock::{UserLockGuard, UserLocks};
pub use wallet_ledger::WalletLedger;
