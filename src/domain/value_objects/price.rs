use serde::Serialize;

use super::money::Money;
use super::quantity::Quantity;
use crate::domain::errors::ValidationError;

/// Per-share stock price; always finite and strictly positive
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value <= 0.0 {
            return Err(ValidationError::InvalidPrice(format!(
                "price must be greater than zero, got {}",
                value
            )));
        }
        Ok(Price(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Notional value of `quantity` shares at this price
    pub fn total(&self, quantity: Quantity) -> Result<Money, ValidationError> {
        Money::new(self.0 * quantity.value() as f64)
    }
}
