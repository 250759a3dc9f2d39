//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys, non-members
/// - **Resource Errors**: Gifts or gateway payments that don't exist
/// - **Ledger Errors**: Contributions that violate the gift funding state
/// - **Gateway Errors**: The payment processor declined or was unreachable
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Caller holds no membership relation to the wedding owning the gift.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Caller is not a member of this wedding")]
    NotWeddingMember,

    /// Requested gift does not exist or is inactive.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Gift not found")]
    GiftNotFound,

    /// Gift has already been fully funded; no further contributions accepted.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Gift is already fully paid")]
    GiftAlreadyPaid,

    /// Contribution amount exceeds the gift's remaining balance.
    ///
    /// Raised before the gateway is contacted, so no charge is ever created
    /// for an amount that cannot be reconciled.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Amount exceeds the gift's remaining balance")]
    AmountExceedsRemaining,

    /// The payment gateway has no record of the requested payment id.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Payment not found")]
    PaymentNotFound,

    /// The payment gateway declined the charge.
    ///
    /// Surfaced as a client error; the request is not retried and no ledger
    /// mutation is performed.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Payment declined: {0}")]
    GatewayRejected(String),

    /// The payment gateway could not be reached (network error, auth
    /// failure, timeout, or a gateway-side outage).
    ///
    /// A timed-out charge may still be in flight; a later webhook settles it.
    /// Gift state is left unchanged.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidApiKey` → 401 Unauthorized
/// - `NotWeddingMember` → 403 Forbidden
/// - `GiftNotFound` / `GiftAlreadyPaid` / `AmountExceedsRemaining` / `InvalidRequest` → 400 Bad Request
/// - `PaymentNotFound` → 404 Not Found
/// - `GatewayRejected` → 422 Unprocessable Entity
/// - `GatewayUnavailable` → 502 Bad Gateway
/// - `Database` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::NotWeddingMember => (
                StatusCode::FORBIDDEN,
                "not_wedding_member",
                self.to_string(),
            ),
            AppError::GiftNotFound => {
                (StatusCode::BAD_REQUEST, "gift_not_found", self.to_string())
            }
            AppError::GiftAlreadyPaid => (
                StatusCode::BAD_REQUEST,
                "gift_already_paid",
                self.to_string(),
            ),
            AppError::AmountExceedsRemaining => (
                StatusCode::BAD_REQUEST,
                "amount_exceeds_remaining",
                self.to_string(),
            ),
            AppError::PaymentNotFound => {
                (StatusCode::NOT_FOUND, "payment_not_found", self.to_string())
            }
            AppError::GatewayRejected(ref reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "payment_declined",
                reason.clone(),
            ),
            AppError::GatewayUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "gateway_unavailable",
                "Payment gateway is unavailable".to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}
