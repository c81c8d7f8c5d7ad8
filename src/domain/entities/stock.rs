use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Price, Symbol};

/// Catalog entry; the price is fixed at creation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: Uuid,
    pub symbol: Symbol,
    pub name: String,
    pub price: Price,
    pub created_at: DateTime<Utc>,
}

impl Stock {
    pub fn new(symbol: Symbol, name: String, price: Price) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            name,
            price,
            created_at: Utc::now(),
        }
    }
}
