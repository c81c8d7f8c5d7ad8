use std::fmt;
use thiserror::Error;

/// Result alias used by every ledger operation and storage port
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure taxonomy shared by the catalog, ledgers and the order executor
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    /// Non-positive amount/quantity/price or malformed identifier
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown user or stock
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Duplicate symbol or email at creation
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("Insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient holdings of {symbol}: requested {requested}, held {held}")]
    InsufficientHoldings {
        symbol: String,
        requested: i64,
        held: i64,
    },

    /// A commit step failed after its counterpart had already been applied
    /// and the compensating action could not restore the previous state.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Storage or transport failure unrelated to business rules
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Invalid email or password")]
    InvalidCredentials,
}

impl LedgerError {
    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl fmt::Display) -> Self {
        LedgerError::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    /// Get the severity level of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LedgerError::InvalidInput(_) => ErrorSeverity::Minor,
            LedgerError::NotFound { .. } => ErrorSeverity::Minor,
            LedgerError::Conflict { .. } => ErrorSeverity::Minor,
            LedgerError::InvalidCredentials => ErrorSeverity::Minor,
            LedgerError::InsufficientFunds { .. } => ErrorSeverity::Moderate,
            LedgerError::InsufficientHoldings { .. } => ErrorSeverity::Moderate,
            LedgerError::Timeout(_) => ErrorSeverity::Moderate,
            LedgerError::Internal(_) => ErrorSeverity::Critical,
            LedgerError::ConsistencyViolation(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether the caller may blindly retry the same request.
    ///
    /// Only a timeout while waiting for the exclusion domain qualifies: no
    /// mutation was attempted. `Internal` and `ConsistencyViolation` leave the
    /// outcome indeterminate and must be reconciled against authoritative
    /// state first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Timeout(_))
    }

    /// Get a short error code for logging/monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "ERR_INVALID_INPUT",
            LedgerError::NotFound { .. } => "ERR_NOT_FOUND",
            LedgerError::Conflict { .. } => "ERR_CONFLICT",
            LedgerError::InsufficientFunds { .. } => "ERR_INSUFFICIENT_FUNDS",
            LedgerError::InsufficientHoldings { .. } => "ERR_INSUFFICIENT_HOLDINGS",
            LedgerError::ConsistencyViolation(_) => "ERR_CONSISTENCY_VIOLATION",
            LedgerError::Internal(_) => "ERR_INTERNAL",
            LedgerError::Timeout(_) => "ERR_TIMEOUT",
            LedgerError::InvalidCredentials => "ERR_INVALID_CREDENTIALS",
        }
    }
}

/// Severity levels for ledger errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Rejected request, expected during normal operation
    Minor,
    /// Business rule or contention rejection
    Moderate,
    /// Requires operator attention
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Minor => write!(f, "Minor"),
            ErrorSeverity::Moderate => write!(f, "Moderate"),
            ErrorSeverity::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Value must be finite")]
    MustBeFinite,
}

impl From<ValidationError> for LedgerError {
    fn from(error: ValidationError) -> Self {
        LedgerError::InvalidInput(error.to_string())
    }
}
