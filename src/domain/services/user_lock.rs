//! Per-user exclusion domains
//!
//! Every operation that reads-then-mutates a user's balance or holdings runs
//! while holding that user's guard. Operations on different users never wait
//! on each other. Slots are created on demand and removed once the last
//! holder or waiter lets go, so the table only holds users with work in
//! flight.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, warn};

use crate::domain::entities::UserId;
use crate::domain::errors::{LedgerError, LedgerResult};

type Slot = Arc<tokio::sync::Mutex<()>>;
type SlotTable = Arc<Mutex<HashMap<UserId, Slot>>>;

/// Registry of per-user async mutexes
#[derive(Clone)]
pub struct UserLocks {
    slots: SlotTable,
    timeout: Duration,
}

impl UserLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Wait for exclusive access to `user`'s domain.
    ///
    /// Fails with `Timeout` if the domain is not released within the
    /// configured bound; nothing has been mutated in that case.
    pub async fn acquire(&self, user: UserId) -> LedgerResult<UserLockGuard> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(user).or_default().clone()
        };

        // Build the guard before waiting so a cancelled or timed-out wait
        // still releases our reference to the slot.
        let mut guard = UserLockGuard {
            inner: None,
            slot,
            user,
            slots: self.slots.clone(),
        };

        match tokio::time::timeout(self.timeout, guard.slot.clone().lock_owned()).await {
            Ok(inner) => {
                guard.inner = Some(inner);
                Ok(guard)
            }
            Err(_) => {
                warn!("Timed out after {:?} waiting for user {}", self.timeout, user);
                Err(LedgerError::Timeout(format!("exclusive access to user {}", user)))
            }
        }
    }

    /// Number of users with a holder or waiter right now
    pub fn active_domains(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Proof of exclusive access to one user's balance and holdings
pub struct UserLockGuard {
    inner: Option<OwnedMutexGuard<()>>,
    slot: Slot,
    user: UserId,
    slots: SlotTable,
}

impl UserLockGuard {
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Run `work` on its own task, holding this guard until it finishes.
    ///
    /// Dropping the returned future does not cancel the work: once a
    /// mutation has started it completes or compensates, and the domain is
    /// released only after that.
    pub async fn run_to_completion<T, F, Fut>(self, work: F) -> LedgerResult<T>
    where
        F: FnOnce(UserLockGuard) -> Fut,
        Fut: Future<Output = LedgerResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let user = self.user;
        tokio::spawn(work(self)).await.map_err(|e| {
            error!("Task for user {} did not finish: {}", user, e);
            LedgerError::Internal(format!("task for user {} did not finish: {}", user, e))
        })?
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        drop(self.inner.take());

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference is ours, one is the table's. Anything more is a
        // waiter that still needs the slot.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.user);
        }
    }
}
