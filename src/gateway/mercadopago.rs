//! Mercado Pago payment gateway implementation.
//!
//! Integrates with Mercado Pago's Payments API for pix and card charges.
//! This module is the only place in the crate that touches the processor's
//! wire format: amounts are converted between internal cents and the API's
//! decimal major units here, and status strings are folded into the closed
//! `GatewayStatus` vocabulary here.

use crate::error::AppError;
use crate::gateway::{
    ChargeRequest, CreatedPayment, GatewayStatus, PaymentGateway, PaymentLookup,
};
use crate::models::payment::PaymentMethod;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Mercado Pago gateway configuration.
#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    /// API access token
    pub access_token: String,
    /// API base URL (defaults to https://api.mercadopago.com)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MercadoPagoConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: "https://api.mercadopago.com".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Mercado Pago payment gateway.
pub struct MercadoPagoGateway {
    config: MercadoPagoConfig,
    client: Client,
}

impl MercadoPagoGateway {
    /// Create a new gateway instance.
    ///
    /// The HTTP client carries the configured timeout, so every gateway
    /// call is bounded; a timeout surfaces as `GatewayUnavailable`.
    pub fn new(config: MercadoPagoConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::GatewayUnavailable(format!("HTTP client error: {e}")))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_payment(&self, charge: ChargeRequest) -> Result<CreatedPayment, AppError> {
        info!(
            "Creating gateway payment: {} cents, method {:?}, reference {}",
            charge.amount_cents, charge.method, charge.external_reference
        );

        let mut payload = serde_json::json!({
            "transaction_amount": cents_to_major(charge.amount_cents),
            "description": charge.description,
            "payment_method_id": method_id(charge.method),
            "payer": { "email": charge.payer_email },
            "external_reference": charge.external_reference,
        });

        if charge.method == PaymentMethod::Card {
            if let Some(token) = charge.card_token {
                payload["token"] = serde_json::Value::String(token);
            }
            payload["installments"] = serde_json::json!(1);
        }

        let url = format!("{}/v1/payments", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            // Mercado Pago requires a per-request idempotency key for
            // payment creation
            .header("X-Idempotency-Key", idempotency_key())
            .json(&payload)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            let raw: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| AppError::GatewayUnavailable(format!("invalid gateway response: {e}")))?;
            let payment: MpPayment = serde_json::from_value(raw.clone())
                .map_err(|e| AppError::GatewayUnavailable(format!("invalid gateway response: {e}")))?;

            info!(
                "Gateway payment created: id {}, status {}",
                payment.id, payment.status
            );

            Ok(CreatedPayment {
                id: payment.id.to_string(),
                status: parse_status(&payment.status),
                amount_cents: payment
                    .transaction_amount
                    .map(major_to_cents)
                    .unwrap_or(charge.amount_cents),
                raw,
            })
        } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            // The processor declined the request (bad card token, unsupported
            // method, amount below minimum, ...)
            let message = error_message(&body, status);
            warn!("Gateway rejected payment creation: {}", message);
            Err(AppError::GatewayRejected(message))
        } else {
            let message = error_message(&body, status);
            error!("Gateway error creating payment: {}", message);
            Err(AppError::GatewayUnavailable(message))
        }
    }

    async fn fetch_payment_status(&self, payment_id: &str) -> Result<PaymentLookup, AppError> {
        info!("Fetching gateway payment status: id {}", payment_id);

        let url = format!("{}/v1/payments/{}", self.config.base_url, payment_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::PaymentNotFound);
        }
        if !status.is_success() {
            let message = error_message(&body, status);
            error!("Gateway error fetching payment {}: {}", payment_id, message);
            return Err(AppError::GatewayUnavailable(message));
        }

        let payment: MpPayment = serde_json::from_str(&body)
            .map_err(|e| AppError::GatewayUnavailable(format!("invalid gateway response: {e}")))?;

        info!(
            "Gateway payment {} status: {}",
            payment.id, payment.status
        );

        Ok(PaymentLookup {
            id: payment.id.to_string(),
            status: parse_status(&payment.status),
            amount_cents: payment.transaction_amount.map(major_to_cents).unwrap_or(0),
            method: payment.payment_method_id.as_deref().and_then(parse_method),
            external_reference: payment.external_reference,
            date_created: payment.date_created,
        })
    }
}

/// Payment fields read from Mercado Pago responses.
///
/// The full response body is kept as raw JSON for passthrough; this struct
/// only names the fields the service acts on.
#[derive(Debug, Deserialize)]
struct MpPayment {
    id: i64,
    status: String,
    #[serde(default)]
    transaction_amount: Option<f64>,
    #[serde(default)]
    payment_method_id: Option<String>,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    date_created: Option<DateTime<Utc>>,
}

/// Convert internal cents to the API's decimal major units.
fn cents_to_major(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Convert the API's decimal major units to internal cents.
fn major_to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Mercado Pago payment_method_id for an internal payment method.
fn method_id(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Pix => "pix",
        PaymentMethod::Card => "credit_card",
    }
}

/// Fold a processor status string into the closed vocabulary.
fn parse_status(status: &str) -> GatewayStatus {
    match status {
        "approved" => GatewayStatus::Approved,
        "pending" => GatewayStatus::Pending,
        "rejected" => GatewayStatus::Rejected,
        "cancelled" => GatewayStatus::Cancelled,
        other => {
            warn!("Unrecognized gateway status: {}", other);
            GatewayStatus::Unknown
        }
    }
}

/// Recognize a processor payment_method_id.
fn parse_method(method_id: &str) -> Option<PaymentMethod> {
    match method_id {
        "pix" => Some(PaymentMethod::Pix),
        "credit_card" | "debit_card" => Some(PaymentMethod::Card),
        _ => None,
    }
}

/// Random idempotency key for charge creation (32 hex chars).
fn idempotency_key() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// Map a transport-level reqwest error to `GatewayUnavailable`.
///
/// Timeouts land here: the charge may still be in flight, so the error must
/// never be read as a settlement failure.
fn request_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::GatewayUnavailable("request timed out".to_string())
    } else {
        AppError::GatewayUnavailable(format!("request failed: {e}"))
    }
}

/// Extract a human-readable message from an error response body.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Regression tests for the unit conversion: cents are converted to
    // major units exactly once, at this boundary, in each direction.
    // Historically this domain has doubled or halved amounts by converting
    // in more than one place.
    #[test]
    fn cents_convert_to_major_units_once() {
        assert_eq!(cents_to_major(30000), 300.0);
        assert_eq!(cents_to_major(10000), 100.0);
        assert_eq!(cents_to_major(1), 0.01);
    }

    #[test]
    fn major_units_convert_to_cents_once() {
        assert_eq!(major_to_cents(300.0), 30000);
        assert_eq!(major_to_cents(100.0), 10000);
        assert_eq!(major_to_cents(0.01), 1);
    }

    #[test]
    fn conversion_round_trips_odd_amounts() {
        assert_eq!(major_to_cents(cents_to_major(12345)), 12345);
        assert_eq!(major_to_cents(cents_to_major(999)), 999);
    }

    #[test]
    fn known_statuses_parse_to_closed_vocabulary() {
        assert_eq!(parse_status("approved"), GatewayStatus::Approved);
        assert_eq!(parse_status("pending"), GatewayStatus::Pending);
        assert_eq!(parse_status("rejected"), GatewayStatus::Rejected);
        assert_eq!(parse_status("cancelled"), GatewayStatus::Cancelled);
    }

    #[test]
    fn unrecognized_status_is_unknown() {
        assert_eq!(parse_status("in_process"), GatewayStatus::Unknown);
        assert_eq!(parse_status(""), GatewayStatus::Unknown);
    }

    #[test]
    fn method_ids_parse() {
        assert_eq!(parse_method("pix"), Some(PaymentMethod::Pix));
        assert_eq!(parse_method("credit_card"), Some(PaymentMethod::Card));
        assert_eq!(parse_method("debit_card"), Some(PaymentMethod::Card));
        assert_eq!(parse_method("ticket"), None);
    }

    #[test]
    fn config_defaults() {
        let config = MercadoPagoConfig::default();
        assert_eq!(config.base_url, "https://api.mercadopago.com");
        assert_eq!(config.timeout_secs, 5);
    }
}
