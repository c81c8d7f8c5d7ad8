use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::Money;

pub type UserId = Uuid;

/// Parse a client-supplied user identifier
pub fn parse_user_id(raw: &str) -> Result<UserId, ValidationError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ValidationError::InvalidIdentifier(format!("'{}' is not a valid user id", raw)))
}

/// Account holder; the wallet balance lives on this record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub wallet_balance: Money,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New account with an empty wallet
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            wallet_balance: Money::ZERO,
            created_at: Utc::now(),
        }
    }
}
