use serde::Serialize;

use crate::domain::errors::ValidationError;

/// Number of shares in a trade; always strictly positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value > 0 {
            Ok(Quantity(value))
        } else {
            Err(ValidationError::InvalidQuantity(format!(
                "quantity must be greater than zero, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
