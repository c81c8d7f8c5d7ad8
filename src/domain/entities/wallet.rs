use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserId;

/// Why a wallet balance moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletMethod {
    Deposit,
    Withdraw,
    TradeSettlement,
}

impl WalletMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletMethod::Deposit => "deposit",
            WalletMethod::Withdraw => "withdraw",
            WalletMethod::TradeSettlement => "trade-settlement",
        }
    }
}

impl fmt::Display for WalletMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(WalletMethod::Deposit),
            "withdraw" => Ok(WalletMethod::Withdraw),
            "trade-settlement" => Ok(WalletMethod::TradeSettlement),
            other => Err(format!("unknown wallet method '{}'", other)),
        }
    }
}

/// Immutable wallet log entry.
///
/// Deposits and withdrawals carry the unsigned amount moved. Trade
/// settlements are signed: negative when cash left the wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub method: WalletMethod,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn new(user_id: UserId, method: WalletMethod, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            method,
            amount,
            created_at: Utc::now(),
        }
    }

    /// Signed effect of this entry on the balance
    pub fn balance_delta(&self) -> f64 {
        match self.method {
            WalletMethod::Deposit => self.amount,
            WalletMethod::Withdraw => -self.amount,
            WalletMethod::TradeSettlement => self.amount,
        }
    }
}
