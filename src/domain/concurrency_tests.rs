//! Concurrency safety of the per-user exclusion domain
//! Same-user operations must linearize; different users must not contend

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::OrderSide;
use crate::domain::errors::LedgerError;
use crate::test_support::TestLedger;

// ============================================================================
// SAME USER
// ============================================================================

/// N withdrawals summing past the balance: an admissible prefix succeeds,
/// the rest fail, and the balance never goes negative.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_never_overdraw() {
    let ledger = Arc::new(TestLedger::new().await);
    let user = ledger.user_with_balance(100.0).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.wallet.withdraw(user, 15.0).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected failure: {:?}", other),
        }
    }

    assert_eq!(accepted, 6);
    assert_eq!(ledger.balance(user).await, 10.0);
    assert_eq!(ledger.history(user).await.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_buys_respect_balance() {
    let ledger = Arc::new(TestLedger::new().await);
    let user = ledger.user_with_balance(1000.0).await;
    ledger.stock("ABC", 50.0).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.executor.buy(user, "ABC", 3).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected failure: {:?}", other),
        }
    }

    // 150 per order: six fit in 1000
    assert_eq!(accepted, 6);
    assert_eq!(ledger.balance(user).await, 100.0);
    assert_eq!(ledger.holdings(user, "ABC").await, 18);
    assert_eq!(ledger.orders(user).await.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sells_never_oversell() {
    let ledger = Arc::new(TestLedger::new().await);
    let user = ledger.user_with_balance(0.0).await;
    ledger.stock("XYZ", 10.0).await;
    ledger.give_shares(user, "XYZ", 10).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.executor.sell(user, "XYZ", 3).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::InsufficientHoldings { .. }) => {}
            Err(other) => panic!("unexpected failure: {:?}", other),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(ledger.holdings(user, "XYZ").await, 1);
    assert_eq!(ledger.balance(user).await, 90.0);
}

/// Deposits, withdrawals and trades racing on one user end in a state
/// explained by the wallet log and the order log.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_operations_stay_consistent() {
    let ledger = Arc::new(TestLedger::new().await);
    let user = ledger.user_with_balance(0.0).await;
    ledger.stock("ABC", 25.0).await;

    let mut handles = Vec::new();
    for i in 0..30 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            match i % 4 {
                0 => ledger.wallet.deposit(user, 100.0).await.map(|_| ()),
                1 => ledger.wallet.withdraw(user, 40.0).await.map(|_| ()),
                2 => ledger.executor.buy(user, "ABC", 2).await.map(|_| ()),
                _ => ledger.executor.sell(user, "ABC", 1).await.map(|_| ()),
            }
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(())
            | Err(LedgerError::InsufficientFunds { .. })
            | Err(LedgerError::InsufficientHoldings { .. }) => {}
            Err(other) => panic!("unexpected failure: {:?}", other),
        }
    }

    let logged: f64 = ledger
        .history(user)
        .await
        .iter()
        .map(|t| t.balance_delta())
        .sum();
    let balance = ledger.balance(user).await;
    assert!(balance >= 0.0);
    assert!((balance - logged).abs() < 1e-9);

    let net_shares: i64 = ledger
        .orders(user)
        .await
        .iter()
        .map(|o| match o.side {
            OrderSide::Buy => o.quantity.value(),
            OrderSide::Sell => -o.quantity.value(),
        })
        .sum();
    assert_eq!(ledger.holdings(user, "ABC").await, net_shares);
    assert_eq!(ledger.locks.active_domains(), 0);
}

// ============================================================================
// DIFFERENT USERS
// ============================================================================

/// A stalled domain for one user must not hold up another user's trades
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_users_do_not_block() {
    let ledger = Arc::new(TestLedger::with_lock_timeout(Duration::from_millis(200)).await);
    let stalled = ledger.user_with_balance(1000.0).await;
    let active = ledger.user_with_balance(1000.0).await;
    ledger.stock("ABC", 50.0).await;

    let _held = ledger.locks.acquire(stalled).await.unwrap();

    let order = ledger.executor.buy(active, "ABC", 2).await;
    assert!(order.is_ok());
    assert_eq!(ledger.balance(active).await, 900.0);

    assert!(matches!(
        ledger.executor.buy(stalled, "ABC", 2).await,
        Err(LedgerError::Timeout(_))
    ));
    assert_eq!(ledger.balance(stalled).await, 1000.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_users_trade_in_parallel() {
    let ledger = Arc::new(TestLedger::new().await);
    ledger.stock("ABC", 10.0).await;

    let mut users = Vec::new();
    for _ in 0..8 {
        users.push(ledger.user_with_balance(100.0).await);
    }

    let mut handles = Vec::new();
    for &user in &users {
        for _ in 0..5 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.executor.buy(user, "ABC", 2).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for &user in &users {
        assert_eq!(ledger.balance(user).await, 0.0);
        assert_eq!(ledger.holdings(user, "ABC").await, 10);
        assert_eq!(ledger.orders(user).await.len(), 5);
    }
}
