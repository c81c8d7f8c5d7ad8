use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::errors::{ErrorSeverity, LedgerError, ValidationError};

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// HTTP face of a `LedgerError`
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LedgerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::Conflict { .. } => StatusCode::CONFLICT,
            LedgerError::InsufficientFunds { .. } | LedgerError::InsufficientHoldings { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::ConsistencyViolation(_) | LedgerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LedgerError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        ApiError(error)
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.0.severity() {
            ErrorSeverity::Critical => {
                tracing::error!("[{}] {} -> {}", self.0.error_code(), self.0, status)
            }
            ErrorSeverity::Moderate => {
                tracing::warn!("[{}] {} -> {}", self.0.error_code(), self.0, status)
            }
            ErrorSeverity::Minor => {
                tracing::debug!("[{}] {} -> {}", self.0.error_code(), self.0, status)
            }
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.error_code(),
        };
        (status, Json(body)).into_response()
    }
}
