//! Application error types with HTTP status code mapping.
//!
//! [`AppError`] is the central error type for every handler and service.
//! Each variant maps to a specific HTTP status code and a structured JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{FeeError, FieldErrors};
use crate::payment::GatewayError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1003,
///     "message": "amount mismatch: expected 101500, got 90000",
///     "details": { "expected": 101500, "submitted": 90000 }
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`AppError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional machine-readable details (e.g. per-field messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status               |
/// |-----------|---------------------|---------------------------|
/// | 1000–1999 | Validation          | 400 Bad Request           |
/// | 2000–2999 | Authentication      | 401 / 403                 |
/// | 3000–3999 | Not Found, Conflict | 404 Not Found / 409       |
/// | 4000–4999 | Upstream            | 502 Bad Gateway           |
/// | 5000–5999 | Server              | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// One or more submitted fields failed validation.
    #[error("validation failed for {} field(s)", .0.len())]
    InvalidFields(FieldErrors),

    /// Client-submitted or gateway-reported amount disagrees with the
    /// server-side calculation.
    #[error("amount mismatch: expected {expected}, got {submitted}")]
    AmountMismatch {
        /// Server-calculated amount in minor units.
        expected: i64,
        /// Submitted amount in minor units.
        submitted: i64,
    },

    /// Missing, malformed, or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced record does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Operation conflicts with the current state of a record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The payment gateway failed or answered unexpectedly.
    #[error("payment gateway error: {0}")]
    PaymentGateway(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for [`AppError::NotFound`].
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidFields(_) => 1002,
            Self::AmountMismatch { .. } => 1003,
            Self::Unauthorized(_) => 2001,
            Self::Forbidden(_) => 2002,
            Self::NotFound(_) => 3001,
            Self::Conflict(_) => 3002,
            Self::PaymentGateway(_) => 4001,
            Self::PersistenceError(_) => 5001,
            Self::Internal(_) => 5000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidFields(_) | Self::AmountMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Server-side failures are replaced by a
    /// generic message; the original is only logged.
    fn public_message(&self) -> String {
        match self {
            Self::PersistenceError(_) | Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InvalidFields(fields) => serde_json::to_value(fields).ok(),
            Self::AmountMismatch {
                expected,
                submitted,
            } => Some(serde_json::json!({
                "expected": expected,
                "submitted": submitted,
            })),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<FeeError> for AppError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::AmountMismatch {
                expected,
                submitted,
            } => Self::AmountMismatch {
                expected,
                submitted,
            },
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::PaymentGateway(err.to_string())
    }
}

impl From<FieldErrors> for AppError {
    fn from(fields: FieldErrors) -> Self {
        Self::InvalidFields(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.public_message(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_categories() {
        assert_eq!(
            AppError::InvalidRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::not_found("event").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::PaymentGateway("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn fee_mismatch_maps_to_amount_mismatch() {
        let err = AppError::from(FeeError::AmountMismatch {
            expected: 1000,
            submitted: 1200,
        });
        assert_eq!(err.error_code(), 1003);
        let Some(details) = err.details() else {
            panic!("expected details");
        };
        assert_eq!(details["expected"], 1000);
        assert_eq!(details["submitted"], 1200);
    }

    #[test]
    fn server_errors_hide_internals() {
        let err = AppError::PersistenceError("connection refused to 10.0.0.3".into());
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn field_errors_become_details() {
        let mut fields = FieldErrors::new();
        fields.add("title", "title is required");
        let err = AppError::from(fields);
        assert_eq!(err.to_string(), "validation failed for 1 field(s)");
        let Some(details) = err.details() else {
            panic!("expected details");
        };
        assert_eq!(details["title"], "title is required");
    }
}
