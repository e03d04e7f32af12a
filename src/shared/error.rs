//! Application Error Types
//!
//! Centralized error handling shared by every layer.

use serde::Serialize;
use validator::ValidationErrors;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller may retry the failed operation as-is.
    ///
    /// Only store timeouts are retryable; everything else is a
    /// deterministic rejection or an internal fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }

    /// Stable machine-readable code for logs and error payloads.
    pub fn code(&self) -> u16 {
        match self {
            AppError::Internal(_) => 10000,
            AppError::NotFound(_) => 10001,
            AppError::Unauthenticated(_) => 10003,
            AppError::Forbidden(_) => 10004,
            AppError::Conflict(_) => 10005,
            AppError::Validation(_) => 10007,
            AppError::Invariant(_) => 10008,
            AppError::Unavailable(_) => 10009,
        }
    }
}

/// Collapse validator output into a `Validation` error naming the first
/// failing field, so `input.validate()?` reads like any other check.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| {
                    let detail = err.message.as_deref().unwrap_or("invalid value");
                    format!("{}: {}", field, detail)
                })
            })
            .next()
            .unwrap_or_else(|| "Validation failed".to_string());

        AppError::Validation(first)
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            errors: None,
        }
    }
}
