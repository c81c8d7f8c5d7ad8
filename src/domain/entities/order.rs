use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserId;
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{Money, Price, Quantity, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side '{}'", other)),
        }
    }
}

/// Executed trade. One per successful buy/sell, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: UserId,
    pub symbol: Symbol,
    #[serde(rename = "type")]
    pub side: OrderSide,
    pub quantity: Quantity,
    pub price: Price,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: UserId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            symbol,
            side,
            quantity,
            price,
            created_at: Utc::now(),
        }
    }

    pub fn total_value(&self) -> Result<Money, ValidationError> {
        self.price.total(self.quantity)
    }
}
