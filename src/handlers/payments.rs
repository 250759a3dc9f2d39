//! Payment HTTP handlers.
//!
//! This module implements the payment-related API endpoints:
//! - POST /api/v1/payments - Contribute toward a gift (pix or card)
//! - POST /api/v1/payments/webhook - Gateway notification receiver
//! - GET /api/v1/payments/status/:payment_id - Query a payment at the gateway
//!
//! The webhook route is public: the gateway authenticates itself via origin
//! marker and signature, not via an API key.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::payment::{CreatePaymentRequest, PaymentStatusResponse, WebhookAck},
    services::{payment_service, webhook_service},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
};

/// Contribute toward a gift.
///
/// # Request Body
///
/// ```json
/// {
///   "gift_id": "660e8400-...",
///   "amount_cents": 10000,
///   "method": "pix",
///   "payer_email": "guest@example.com"
/// }
/// ```
///
/// # Response (200)
///
/// The raw gateway response. For pix it carries the QR code and copy-paste
/// payload; for card it carries the charge status. A `pending` status does
/// NOT mean the contribution failed - card settlements complete
/// asynchronously via the webhook.
///
/// # Errors
///
/// - 400: gift not found / already paid / amount exceeds remaining
/// - 403: caller is not a member of the wedding
/// - 422: the gateway declined the charge
/// - 502: the gateway could not be reached (gift state unchanged)
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let created = payment_service::create_contribution(
        &state.pool,
        state.gateway.as_ref(),
        auth.api_key_id,
        request,
    )
    .await?;

    Ok(Json(created.raw))
}

/// Gateway webhook receiver.
///
/// Always answers 200 with an acknowledgement body; `received: false`
/// signals the gateway should redeliver (or that the notification was
/// rejected outright).
///
/// # Response
///
/// ```json
/// { "received": true, "status": "approved" }
/// ```
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Json<WebhookAck> {
    let ack = webhook_service::process_notification(
        &state.pool,
        state.gateway.as_ref(),
        state.webhook_secret.as_deref(),
        &headers,
        &body,
    )
    .await;

    Json(ack)
}

/// Query a payment's state at the gateway.
///
/// # Response (200)
///
/// ```json
/// {
///   "id": "123456789",
///   "status": "approved",
///   "amount_cents": 10000,
///   "external_reference": "gift_660e8400-...",
///   "date_created": "2025-07-31T16:58:46Z"
/// }
/// ```
///
/// # Errors
///
/// - 404: the gateway has no record of this payment id
/// - 502: the gateway could not be reached
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let lookup = state.gateway.fetch_payment_status(&payment_id).await?;

    Ok(Json(PaymentStatusResponse {
        id: lookup.id,
        status: lookup.status.as_str().to_string(),
        amount_cents: lookup.amount_cents,
        external_reference: lookup.external_reference,
        date_created: lookup.date_created,
    }))
}
