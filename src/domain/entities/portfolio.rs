use serde::Serialize;

use super::user::UserId;
use crate::domain::value_objects::{Price, Symbol};

/// Holding of one symbol by one user. Kept at zero once fully sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioEntry {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub quantity: i64,
}

/// Holding joined with its catalog price
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: Symbol,
    pub stock_name: String,
    pub quantity: i64,
    pub current_price: Price,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    pub user_id: UserId,
    pub holdings: Vec<Holding>,
    pub total_portfolio_value: f64,
}

impl PortfolioView {
    pub fn new(user_id: UserId, holdings: Vec<Holding>) -> Self {
        let total_portfolio_value = holdings.iter().map(|h| h.total_value).sum();
        Self {
            user_id,
            holdings,
            total_portfolio_value,
        }
    }
}
