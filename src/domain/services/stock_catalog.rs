//! StockCatalog - symbol to name/price lookup
//!
//! Prices never change after creation, so reads take no lock.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::entities::Stock;
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::StockRepository;
use crate::domain::value_objects::{Price, Symbol};

pub struct StockCatalog {
    stocks: Arc<dyn StockRepository>,
}

impl StockCatalog {
    pub fn new(stocks: Arc<dyn StockRepository>) -> Self {
        Self { stocks }
    }

    /// List a new stock. The symbol is normalized before the uniqueness check.
    pub async fn create(&self, symbol: &str, name: &str, price: f64) -> LedgerResult<Stock> {
        let symbol = Symbol::parse(symbol)?;
        let price = Price::new(price)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput(
                "stock name must not be empty".to_string(),
            ));
        }

        let stock = Stock::new(symbol, name.to_string(), price);
        self.stocks.insert(&stock).await?;

        info!("Listed {} ({}) at {:.2}", stock.symbol, stock.name, price.value());
        Ok(stock)
    }

    pub async fn get_by_symbol(&self, symbol: &str) -> LedgerResult<Stock> {
        let symbol = Symbol::parse(symbol)?;
        self.lookup(&symbol).await
    }

    /// Resolve an already-normalized symbol
    pub async fn lookup(&self, symbol: &Symbol) -> LedgerResult<Stock> {
        let stock = self
            .stocks
            .find_by_symbol(symbol)
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock", symbol))?;

        debug!("Resolved {} at {:.2}", stock.symbol, stock.price.value());
        Ok(stock)
    }

    /// Snapshot of the catalog in listing order
    pub async fn list(&self) -> LedgerResult<Vec<Stock>> {
        self.stocks.list().await
    }
}
