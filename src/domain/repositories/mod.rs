pub mod ledger_store;

pub use ledger_store::{
    LedgerStores, OrderRepository, PortfolioRepository, StockRepository, UserRepository,
    WalletRepository,
};
