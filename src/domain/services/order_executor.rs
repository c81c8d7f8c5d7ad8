//! OrderExecutor service - runs a trade across the wallet, portfolio and
//! order log
//!
//! The three records are separate aggregates with no shared transaction, so a
//! trade is executed as a small saga inside the user's exclusion domain:
//!
//! ```text
//! validating -> pricing -> reserving -> committing-counterpart -> logging -> completed
//!      \____________\__________\                  |                  |
//!                               -> aborted         +-> compensate -> Internal
//!                                                                 \-> consistency-violation
//! ```
//!
//! Once the user's domain is held the saga runs on its own task, so a caller
//! that stops waiting cannot abandon a trade half way.
//!
//! The reservation is always the debit side (cash on a buy, shares on a
//! sell). A failure after the reservation undoes the completed steps in
//! reverse order. Compensation stops at the first step that fails, leaving
//! the user under-credited rather than over-credited.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{Order, OrderSide, UserId, WalletMethod};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::OrderRepository;
use crate::domain::services::portfolio_ledger::PortfolioLedger;
use crate::domain::services::stock_catalog::StockCatalog;
use crate::domain::services::user_lock::{UserLockGuard, UserLocks};
use crate::domain::services::wallet_ledger::WalletLedger;
use crate::domain::value_objects::{Money, Price, Quantity, Symbol};

/// Where a trade currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Validating,
    Pricing,
    Reserving,
    CommittingCounterpart,
    Logging,
    Completed,
    Aborted,
    ConsistencyViolation,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStage::Validating => "validating",
            ExecutionStage::Pricing => "pricing",
            ExecutionStage::Reserving => "reserving",
            ExecutionStage::CommittingCounterpart => "committing-counterpart",
            ExecutionStage::Logging => "logging",
            ExecutionStage::Completed => "completed",
            ExecutionStage::Aborted => "aborted",
            ExecutionStage::ConsistencyViolation => "consistency-violation",
        };
        f.write_str(name)
    }
}

/// Reversal of one completed saga step
#[derive(Debug, Clone, Copy)]
enum Compensation {
    Refund(Money),
    Charge(Money),
    ReturnShares(i64),
    ReclaimShares(i64),
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::Refund(m) => write!(f, "refund {:.2}", m.value()),
            Compensation::Charge(m) => write!(f, "charge back {:.2}", m.value()),
            Compensation::ReturnShares(q) => write!(f, "return {} shares", q),
            Compensation::ReclaimShares(q) => write!(f, "reclaim {} shares", q),
        }
    }
}

/// A validated, priced trade request
struct Ticket {
    user: UserId,
    side: OrderSide,
    symbol: Symbol,
    quantity: Quantity,
    stock_price: Price,
    total: Money,
}

impl Ticket {
    fn order(&self) -> Order {
        Order::new(
            self.user,
            self.symbol.clone(),
            self.side,
            self.quantity,
            self.stock_price,
        )
    }
}

#[derive(Clone)]
pub struct OrderExecutor {
    catalog: Arc<StockCatalog>,
    wallet: Arc<WalletLedger>,
    portfolio: Arc<PortfolioLedger>,
    orders: Arc<dyn OrderRepository>,
    locks: UserLocks,
}

impl OrderExecutor {
    pub fn new(
        catalog: Arc<StockCatalog>,
        wallet: Arc<WalletLedger>,
        portfolio: Arc<PortfolioLedger>,
        orders: Arc<dyn OrderRepository>,
        locks: UserLocks,
    ) -> Self {
        Self {
            catalog,
            wallet,
            portfolio,
            orders,
            locks,
        }
    }

    /// Buy `quantity` shares of `symbol` at the catalog price
    pub async fn buy(&self, user: UserId, symbol: &str, quantity: i64) -> LedgerResult<Order> {
        let ticket = self.prepare(user, OrderSide::Buy, symbol, quantity).await?;
        let domain = self.locks.acquire(user).await?;
        let executor = self.clone();
        domain
            .run_to_completion(move |domain| async move {
                executor.execute_buy(&domain, &ticket).await
            })
            .await
    }

    /// Sell `quantity` shares of `symbol` at the catalog price
    pub async fn sell(&self, user: UserId, symbol: &str, quantity: i64) -> LedgerResult<Order> {
        let ticket = self.prepare(user, OrderSide::Sell, symbol, quantity).await?;
        let domain = self.locks.acquire(user).await?;
        let executor = self.clone();
        domain
            .run_to_completion(move |domain| async move {
                executor.execute_sell(&domain, &ticket).await
            })
            .await
    }

    /// The user's executed orders in acceptance order
    pub async fn orders(&self, user: UserId) -> LedgerResult<Vec<Order>> {
        self.orders.list_for_user(user).await
    }

    /// Validate and price outside the exclusion domain. The price read here is
    /// pinned for the rest of the trade.
    async fn prepare(
        &self,
        user: UserId,
        side: OrderSide,
        symbol: &str,
        quantity: i64,
    ) -> LedgerResult<Ticket> {
        debug!("{} {} {} x{}: {}", side, user, symbol, quantity, ExecutionStage::Validating);
        let quantity = Quantity::new(quantity)?;
        let symbol = Symbol::parse(symbol)?;

        debug!("{} {} {}: {}", side, user, symbol, ExecutionStage::Pricing);
        let stock = self.catalog.lookup(&symbol).await?;
        let total = stock.price.total(quantity)?;

        Ok(Ticket {
            user,
            side,
            symbol,
            quantity,
            stock_price: stock.price,
            total,
        })
    }

    async fn execute_buy(&self, domain: &UserLockGuard, ticket: &Ticket) -> LedgerResult<Order> {
        let shares = ticket.quantity.value();

        self.stage(ticket, ExecutionStage::Reserving);
        if let Err(e) = self
            .wallet
            .debit(domain, ticket.total, WalletMethod::TradeSettlement)
            .await
        {
            return Err(self.abort(ticket, e));
        }

        self.stage(ticket, ExecutionStage::CommittingCounterpart);
        if let Err(e) = self.portfolio.adjust_quantity(domain, &ticket.symbol, shares).await {
            return Err(self
                .compensate(
                    domain,
                    ticket,
                    ExecutionStage::CommittingCounterpart,
                    e,
                    &[Compensation::Refund(ticket.total)],
                )
                .await);
        }

        self.stage(ticket, ExecutionStage::Logging);
        let order = ticket.order();
        if let Err(e) = self.orders.append(&order).await {
            return Err(self
                .compensate(
                    domain,
                    ticket,
                    ExecutionStage::Logging,
                    e,
                    &[
                        Compensation::ReclaimShares(shares),
                        Compensation::Refund(ticket.total),
                    ],
                )
                .await);
        }

        self.completed(&order, ticket);
        Ok(order)
    }

    async fn execute_sell(&self, domain: &UserLockGuard, ticket: &Ticket) -> LedgerResult<Order> {
        let shares = ticket.quantity.value();

        self.stage(ticket, ExecutionStage::Reserving);
        let held = self.portfolio.get_quantity(ticket.user, &ticket.symbol).await?;
        if shares > held {
            return Err(self.abort(
                ticket,
                LedgerError::InsufficientHoldings {
                    symbol: ticket.symbol.to_string(),
                    requested: shares,
                    held,
                },
            ));
        }
        if let Err(e) = self
            .portfolio
            .adjust_quantity(domain, &ticket.symbol, -shares)
            .await
        {
            return Err(self.abort(ticket, e));
        }

        self.stage(ticket, ExecutionStage::CommittingCounterpart);
        if let Err(e) = self
            .wallet
            .credit(domain, ticket.total, WalletMethod::TradeSettlement)
            .await
        {
            return Err(self
                .compensate(
                    domain,
                    ticket,
                    ExecutionStage::CommittingCounterpart,
                    e,
                    &[Compensation::ReturnShares(shares)],
                )
                .await);
        }

        self.stage(ticket, ExecutionStage::Logging);
        let order = ticket.order();
        if let Err(e) = self.orders.append(&order).await {
            return Err(self
                .compensate(
                    domain,
                    ticket,
                    ExecutionStage::Logging,
                    e,
                    &[
                        Compensation::Charge(ticket.total),
                        Compensation::ReturnShares(shares),
                    ],
                )
                .await);
        }

        self.completed(&order, ticket);
        Ok(order)
    }

    fn stage(&self, ticket: &Ticket, stage: ExecutionStage) {
        debug!("{} {} {}: {}", ticket.side, ticket.user, ticket.symbol, stage);
    }

    fn completed(&self, order: &Order, ticket: &Ticket) {
        info!(
            "{} {} x{} {} @ {:.2} for {} (order {})",
            ExecutionStage::Completed,
            ticket.side,
            ticket.quantity.value(),
            ticket.symbol,
            ticket.stock_price.value(),
            ticket.user,
            order.id
        );
    }

    /// Nothing was applied; surface the cause unchanged
    fn abort(&self, ticket: &Ticket, cause: LedgerError) -> LedgerError {
        warn!(
            "{} {} x{} {} for {}: {}",
            ExecutionStage::Aborted,
            ticket.side,
            ticket.quantity.value(),
            ticket.symbol,
            ticket.user,
            cause
        );
        cause
    }

    /// Undo completed steps in order, stopping at the first that fails
    async fn compensate(
        &self,
        domain: &UserLockGuard,
        ticket: &Ticket,
        failed_at: ExecutionStage,
        cause: LedgerError,
        steps: &[Compensation],
    ) -> LedgerError {
        warn!(
            "{} of {} {} for {} failed at {}: {}; compensating",
            ticket.side, ticket.quantity.value(), ticket.symbol, ticket.user, failed_at, cause
        );

        for step in steps {
            if let Err(e) = self.apply(domain, ticket, *step).await {
                error!(
                    "{}: could not {} for {} after {} failed at {}: {}",
                    ExecutionStage::ConsistencyViolation,
                    step,
                    ticket.user,
                    ticket.side,
                    failed_at,
                    e
                );
                return LedgerError::ConsistencyViolation(format!(
                    "{} of {} {} failed at {} ({}) and compensation step '{}' failed: {}",
                    ticket.side,
                    ticket.quantity.value(),
                    ticket.symbol,
                    failed_at,
                    cause,
                    step,
                    e
                ));
            }
        }

        if let LedgerError::ConsistencyViolation(_) = cause {
            error!("{}: {}", ExecutionStage::ConsistencyViolation, cause);
            return cause;
        }

        LedgerError::Internal(format!(
            "{} of {} {} failed at {} and was rolled back: {}",
            ticket.side,
            ticket.quantity.value(),
            ticket.symbol,
            failed_at,
            cause
        ))
    }

    async fn apply(
        &self,
        domain: &UserLockGuard,
        ticket: &Ticket,
        step: Compensation,
    ) -> LedgerResult<()> {
        match step {
            Compensation::Refund(amount) => {
                self.wallet
                    .credit(domain, amount, WalletMethod::TradeSettlement)
                    .await?;
            }
            Compensation::Charge(amount) => {
                self.wallet
                    .debit(domain, amount, WalletMethod::TradeSettlement)
                    .await?;
            }
            Compensation::ReturnShares(shares) => {
                self.portfolio
                    .adjust_quantity(domain, &ticket.symbol, shares)
                    .await?;
            }
            Compensation::ReclaimShares(shares) => {
                self.portfolio
                    .adjust_quantity(domain, &ticket.symbol, -shares)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestLedger;

    #[test]
    fn test_stage_names() {
        assert_eq!(
            ExecutionStage::CommittingCounterpart.to_string(),
            "committing-counterpart"
        );
        assert_eq!(
            ExecutionStage::ConsistencyViolation.to_string(),
            "consistency-violation"
        );
    }

    #[tokio::test]
    async fn test_buy_records_pinned_price() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(1000.0).await;
        ledger.stock("ABC", 50.0).await;

        let order = ledger.executor.buy(user, "abc", 10).await.unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.symbol.as_str(), "ABC");
        assert_eq!(order.price.value(), 50.0);
        assert_eq!(order.quantity.value(), 10);
        let logged = ledger.executor.orders(user).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].id, order.id);
    }

    #[tokio::test]
    async fn test_unknown_stock_is_not_found() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(1000.0).await;

        assert!(matches!(
            ledger.executor.buy(user, "NOPE", 1).await,
            Err(LedgerError::NotFound { entity: "Stock", .. })
        ));
        assert!(matches!(
            ledger.executor.sell(user, "NOPE", 1).await,
            Err(LedgerError::NotFound { entity: "Stock", .. })
        ));
    }

    #[tokio::test]
    async fn test_buy_for_unknown_user_is_not_found() {
        let ledger = TestLedger::new().await;
        ledger.stock("ABC", 50.0).await;

        assert!(matches!(
            ledger.executor.buy(uuid::Uuid::new_v4(), "ABC", 1).await,
            Err(LedgerError::NotFound { entity: "User", .. })
        ));
    }

    #[tokio::test]
    async fn test_domain_released_after_trade() {
        let ledger = TestLedger::new().await;
        let user = ledger.user_with_balance(1000.0).await;
        ledger.stock("ABC", 50.0).await;

        ledger.executor.buy(user, "ABC", 1).await.unwrap();
        let _ = ledger.executor.sell(user, "ABC", 5).await;
        assert_eq!(ledger.locks.active_domains(), 0);
    }
}
