use serde::Serialize;
use std::fmt;

use crate::domain::errors::ValidationError;

const MAX_SYMBOL_LENGTH: usize = 12;

/// Ticker symbol in canonical (trimmed, upper-case) form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(ValidationError::InvalidSymbol(
                "symbol must not be empty".to_string(),
            ));
        }
        if normalized.len() > MAX_SYMBOL_LENGTH {
            return Err(ValidationError::InvalidSymbol(format!(
                "'{}' is longer than {} characters",
                normalized, MAX_SYMBOL_LENGTH
            )));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ValidationError::InvalidSymbol(format!(
                "'{}' contains unsupported characters",
                normalized
            )));
        }

        Ok(Symbol(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
