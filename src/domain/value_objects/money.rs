use serde::Serialize;

use crate::domain::errors::ValidationError;

/// Cash amount; finite and never negative
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Money(f64);

impl Money {
    pub const ZERO: Money = Money(0.0);

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::InvalidAmount(format!(
                "amount must be non-negative, got {}",
                value
            )));
        }
        Ok(Money(value))
    }

    /// An amount moved by a deposit, withdrawal or settlement
    pub fn positive(value: f64) -> Result<Self, ValidationError> {
        let money = Money::new(value)?;
        if money.0 == 0.0 {
            return Err(ValidationError::InvalidAmount(
                "amount must be greater than zero".to_string(),
            ));
        }
        Ok(money)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}
