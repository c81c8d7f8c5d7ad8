//! PortfolioLedger - per-(user, symbol) holding quantities
//!
//! Adjustments are delegated to the store as a single conditional update so a
//! negative result is refused atomically, independent of the caller's lock.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::{Holding, PortfolioView, UserId};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::PortfolioRepository;
use crate::domain::services::stock_catalog::StockCatalog;
use crate::domain::services::user_lock::UserLockGuard;
use crate::domain::value_objects::Symbol;

pub struct PortfolioLedger {
    portfolios: Arc<dyn PortfolioRepository>,
}

impl PortfolioLedger {
    pub fn new(portfolios: Arc<dyn PortfolioRepository>) -> Self {
        Self { portfolios }
    }

    /// Quantity held; zero when no entry exists
    pub async fn get_quantity(&self, user: UserId, symbol: &Symbol) -> LedgerResult<i64> {
        let quantity = self
            .portfolios
            .find(user, symbol)
            .await?
            .map_or(0, |entry| entry.quantity);
        debug!("{} holds {} {}", user, quantity, symbol);
        Ok(quantity)
    }

    /// Apply `delta` to the domain owner's holding of `symbol`
    pub async fn adjust_quantity(
        &self,
        domain: &UserLockGuard,
        symbol: &Symbol,
        delta: i64,
    ) -> LedgerResult<i64> {
        let user = domain.user();
        match self.portfolios.adjust(user, symbol, delta).await {
            Ok(quantity) => {
                info!("Adjusted {} {} by {:+}, now {}", user, symbol, delta, quantity);
                Ok(quantity)
            }
            Err(e @ LedgerError::InsufficientHoldings { .. }) => {
                warn!("Rejected adjustment of {} {} by {:+}: {}", user, symbol, delta, e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Holdings joined with catalog prices, ordered by symbol.
    ///
    /// Entries whose stock can no longer be resolved are skipped.
    pub async fn valuation(&self, user: UserId, catalog: &StockCatalog) -> LedgerResult<PortfolioView> {
        let entries = self.portfolios.list_for_user(user).await?;
        let mut holdings = Vec::with_capacity(entries.len());

        for entry in entries {
            let stock = match catalog.lookup(&entry.symbol).await {
                Ok(stock) => stock,
                Err(LedgerError::NotFound { .. }) => {
                    warn!("Skipping {} holding of unlisted {}", user, entry.symbol);
                    continue;
                }
                Err(e) => return Err(e),
            };
            holdings.push(Holding {
                total_value: entry.quantity as f64 * stock.price.value(),
                symbol: entry.symbol,
                stock_name: stock.name,
                quantity: entry.quantity,
                current_price: stock.price,
            });
        }

        Ok(PortfolioView::new(user, holdings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestLedger;

    #[tokio::test]
    async fn test_absent_entry_is_zero() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(0.0).await;
        let abc = Symbol::parse("ABC").unwrap();
        assert_eq!(ledger.portfolio.get_quantity(user, &abc).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adjust_refuses_negative() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(0.0).await;
        let abc = Symbol::parse("ABC").unwrap();
        let domain = ledger.locks.acquire(user).await.unwrap();

        assert_eq!(ledger.portfolio.adjust_quantity(&domain, &abc, 5).await.unwrap(), 5);
        let err = ledger
            .portfolio
            .adjust_quantity(&domain, &abc, -6)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientHoldings {
                requested: 6,
                held: 5,
                ..
            }
        ));
        assert_eq!(ledger.portfolio.adjust_quantity(&domain, &abc, -5).await.unwrap(), 0);
        drop(domain);

        // Entry persists at zero
        assert_eq!(ledger.portfolio.get_quantity(user, &abc).await.unwrap(), 0);
        assert!(ledger.raw.portfolios.find(user, &abc).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_valuation_joins_catalog() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(0.0).await;
        let xyz = ledger.stock("XYZ", 12.5).await;
        let abc = ledger.stock("ABC", 50.0).await;
        let gone = Symbol::parse("GONE").unwrap();

        let domain = ledger.locks.acquire(user).await.unwrap();
        ledger.portfolio.adjust_quantity(&domain, &xyz, 2).await.unwrap();
        ledger.portfolio.adjust_quantity(&domain, &abc, 6).await.unwrap();
        ledger.portfolio.adjust_quantity(&domain, &gone, 3).await.unwrap();
        drop(domain);

        let view = ledger.portfolio.valuation(user, &ledger.catalog).await.unwrap();
        assert_eq!(view.holdings.len(), 2);
        assert_eq!(view.holdings[0].symbol, abc);
        assert_eq!(view.holdings[0].stock_name, "ABC Corp");
        assert_eq!(view.holdings[0].total_value, 300.0);
        assert_eq!(view.holdings[1].symbol, xyz);
        assert_eq!(view.total_portfolio_value, 325.0);
    }

    #[tokio::test]
    async fn test_valuation_reports_zero_holdings() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(0.0).await;
        let abc = ledger.stock("ABC", 50.0).await;

        let domain = ledger.locks.acquire(user).await.unwrap();
        ledger.portfolio.adjust_quantity(&domain, &abc, 1).await.unwrap();
        ledger.portfolio.adjust_quantity(&domain, &abc, -1).await.unwrap();
        drop(domain);

        let view = ledger.portfolio.valuation(user, &ledger.catalog).await.unwrap();
        assert_eq!(view.holdings.len(), 1);
        assert_eq!(view.holdings[0].quantity, 0);
        assert_eq!(view.total_portfolio_value, 0.0);
    }
}
