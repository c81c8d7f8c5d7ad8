//! Database Models
//!
//! Row shapes for the ledger tables and their conversion into domain
//! entities. A row that no longer satisfies the domain invariants surfaces as
//! `DatabaseError::CorruptRecord`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DatabaseError;
use crate::domain::entities::{
    Order, OrderSide, PortfolioEntry, Stock, User, WalletMethod, WalletTransaction,
};
use crate::domain::value_objects::{Money, Price, Quantity, Symbol};

/// User record in database
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub wallet_balance: f64,
    pub created_at: DateTime<Utc>,
}

/// Wallet log record in database
#[derive(Debug, Clone, FromRow)]
pub struct WalletTransactionRecord {
    pub id: String,
    pub user_id: String,
    pub method: String, // "deposit", "withdraw" or "trade-settlement"
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Stock record in database
#[derive(Debug, Clone, FromRow)]
pub struct StockRecord {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Portfolio record in database
#[derive(Debug, Clone, FromRow)]
pub struct PortfolioRecord {
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
}

/// Order record in database
#[derive(Debug, Clone, FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: String, // "BUY" or "SELL"
    pub quantity: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

fn corrupt(table: &str, detail: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::CorruptRecord(format!("{}: {}", table, detail))
}

fn uuid(table: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| corrupt(table, format!("bad id '{}': {}", raw, e)))
}

impl TryFrom<UserRecord> for User {
    type Error = DatabaseError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            id: uuid("users", &record.id)?,
            name: record.name,
            email: record.email,
            password_hash: record.password_hash,
            wallet_balance: Money::new(record.wallet_balance).map_err(|e| corrupt("users", e))?,
            created_at: record.created_at,
        })
    }
}

impl TryFrom<WalletTransactionRecord> for WalletTransaction {
    type Error = DatabaseError;

    fn try_from(record: WalletTransactionRecord) -> Result<Self, Self::Error> {
        Ok(WalletTransaction {
            id: uuid("wallet_transactions", &record.id)?,
            user_id: uuid("wallet_transactions", &record.user_id)?,
            method: record
                .method
                .parse::<WalletMethod>()
                .map_err(|e| corrupt("wallet_transactions", e))?,
            amount: record.amount,
            created_at: record.created_at,
        })
    }
}

impl TryFrom<StockRecord> for Stock {
    type Error = DatabaseError;

    fn try_from(record: StockRecord) -> Result<Self, Self::Error> {
        Ok(Stock {
            id: uuid("stocks", &record.id)?,
            symbol: Symbol::parse(&record.symbol).map_err(|e| corrupt("stocks", e))?,
            name: record.name,
            price: Price::new(record.price).map_err(|e| corrupt("stocks", e))?,
            created_at: record.created_at,
        })
    }
}

impl TryFrom<PortfolioRecord> for PortfolioEntry {
    type Error = DatabaseError;

    fn try_from(record: PortfolioRecord) -> Result<Self, Self::Error> {
        if record.quantity < 0 {
            return Err(corrupt(
                "portfolio",
                format!("negative quantity {}", record.quantity),
            ));
        }
        Ok(PortfolioEntry {
            user_id: uuid("portfolio", &record.user_id)?,
            symbol: Symbol::parse(&record.symbol).map_err(|e| corrupt("portfolio", e))?,
            quantity: record.quantity,
        })
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = DatabaseError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        Ok(Order {
            id: uuid("orders", &record.id)?,
            user_id: uuid("orders", &record.user_id)?,
            symbol: Symbol::parse(&record.symbol).map_err(|e| corrupt("orders", e))?,
            side: record
                .side
                .parse::<OrderSide>()
                .map_err(|e| corrupt("orders", e))?,
            quantity: Quantity::new(record.quantity).map_err(|e| corrupt("orders", e))?,
            price: Price::new(record.price).map_err(|e| corrupt("orders", e))?,
            created_at: record.created_at,
        })
    }
}
