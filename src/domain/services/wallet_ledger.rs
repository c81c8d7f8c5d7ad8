//! WalletLedger - per-user cash balance and its transaction log
//!
//! The balance (on the user record) and the log are separate aggregates.
//! Every mutation pairs one balance update with one log append, inside the
//! user's exclusion domain. If the append fails the balance update is
//! reverted, so the log always explains the balance. Deposits and
//! withdrawals run on their own task once the domain is held, so the pair is
//! never split by a caller giving up.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{UserId, WalletMethod, WalletTransaction};
use crate::domain::errors::{LedgerError, LedgerResult};
use crate::domain::repositories::{UserRepository, WalletRepository};
use crate::domain::services::user_lock::{UserLockGuard, UserLocks};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Credit,
    Debit,
}

#[derive(Clone)]
pub struct WalletLedger {
    users: Arc<dyn UserRepository>,
    wallets: Arc<dyn WalletRepository>,
    locks: UserLocks,
}

impl WalletLedger {
    pub fn new(
        users: Arc<dyn UserRepository>,
        wallets: Arc<dyn WalletRepository>,
        locks: UserLocks,
    ) -> Self {
        Self {
            users,
            wallets,
            locks,
        }
    }

    /// Add funds and return the new balance
    pub async fn deposit(&self, user: UserId, amount: f64) -> LedgerResult<Money> {
        let amount = Money::positive(amount)?;
        let domain = self.locks.acquire(user).await?;
        let ledger = self.clone();
        domain
            .run_to_completion(move |domain| async move {
                ledger.credit(&domain, amount, WalletMethod::Deposit).await
            })
            .await
    }

    /// Remove funds and return the new balance. No partial withdrawals.
    pub async fn withdraw(&self, user: UserId, amount: f64) -> LedgerResult<Money> {
        let amount = Money::positive(amount)?;
        let domain = self.locks.acquire(user).await?;
        let ledger = self.clone();
        domain
            .run_to_completion(move |domain| async move {
                ledger.debit(&domain, amount, WalletMethod::Withdraw).await
            })
            .await
    }

    pub async fn get_balance(&self, user: UserId) -> LedgerResult<Money> {
        let user = self
            .users
            .find_by_id(user)
            .await?
            .ok_or_else(|| LedgerError::not_found("User", user))?;
        Ok(user.wallet_balance)
    }

    /// Log entries in creation order
    pub async fn get_history(&self, user: UserId) -> LedgerResult<Vec<WalletTransaction>> {
        let history = self.wallets.history(user).await?;
        debug!("Loaded {} wallet entries for {}", history.len(), user);
        Ok(history)
    }

    /// Credit the domain owner's balance and log it under `method`
    pub async fn credit(
        &self,
        domain: &UserLockGuard,
        amount: Money,
        method: WalletMethod,
    ) -> LedgerResult<Money> {
        self.apply(domain, amount, method, Direction::Credit).await
    }

    /// Debit the domain owner's balance and log it under `method`.
    /// `InsufficientFunds` leaves both balance and log untouched.
    pub async fn debit(
        &self,
        domain: &UserLockGuard,
        amount: Money,
        method: WalletMethod,
    ) -> LedgerResult<Money> {
        self.apply(domain, amount, method, Direction::Debit).await
    }

    async fn apply(
        &self,
        domain: &UserLockGuard,
        amount: Money,
        method: WalletMethod,
        direction: Direction,
    ) -> LedgerResult<Money> {
        let user = domain.user();

        let balance = match direction {
            Direction::Credit => self.users.credit_balance(user, amount).await,
            Direction::Debit => self.users.debit_balance(user, amount).await,
        }
        .map_err(|e| {
            if let LedgerError::InsufficientFunds { .. } = e {
                warn!("Rejected {} for {}: {}", method, user, e);
            }
            e
        })?;

        // Deposits and withdrawals are logged unsigned; settlements carry the sign.
        let logged = match (method, direction) {
            (WalletMethod::TradeSettlement, Direction::Debit) => -amount.value(),
            _ => amount.value(),
        };
        let entry = WalletTransaction::new(user, method, logged);

        if let Err(append_err) = self.wallets.append(&entry).await {
            error!("Failed to log {} for {}: {}", method, user, append_err);
            let reverted = match direction {
                Direction::Credit => self.users.debit_balance(user, amount).await,
                Direction::Debit => self.users.credit_balance(user, amount).await,
            };
            return Err(match reverted {
                Ok(_) => LedgerError::Internal(format!(
                    "{} for {} was not logged and has been reverted: {}",
                    method, user, append_err
                )),
                Err(revert_err) => {
                    error!("Failed to revert unlogged {} for {}: {}", method, user, revert_err);
                    LedgerError::ConsistencyViolation(format!(
                        "{} of {:.2} for {} applied without a log entry; revert failed: {}",
                        method,
                        amount.value(),
                        user,
                        revert_err
                    ))
                }
            });
        }

        info!(
            "{} {:.2} for {}, balance {:.2}",
            method,
            amount.value(),
            user,
            balance.value()
        );
        Ok(balance)
    }
}
