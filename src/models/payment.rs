//! Payment API types: contribution requests, status queries, and the
//! webhook notification/acknowledgement pair.
//!
//! # Payment Flow
//!
//! 1. A guest contributes toward a gift via `POST /api/v1/payments`
//! 2. The gateway charge is created and, when it settles immediately, the
//!    gift ledger is credited in the same request
//! 3. Deferred charges (e.g. card payments still pending) settle later via
//!    the gateway webhook, which carries only a payment id
//!
//! Amounts in every request and response body are integer cents. The gateway
//! adapter owns all conversion to the processor's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment method chosen by the contributor.
///
/// Pix is a deferred-settlement method that is typically honored: a pix
/// charge reported as `pending` by the gateway is settled optimistically.
/// Card charges settle only once the gateway approves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Pix,
    Card,
}

/// Request body for contributing toward a gift.
///
/// # JSON Example
///
/// ```json
/// {
///   "gift_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 10000,
///   "method": "pix",
///   "payer_email": "guest@example.com"
/// }
/// ```
///
/// # Validation
///
/// - Gift must exist, be active, and not be fully paid
/// - `amount_cents` must be positive and must not exceed the gift's
///   remaining balance (checked before the gateway is contacted)
/// - `card_token` is required when `method` is `card`
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Gift to contribute toward
    pub gift_id: Uuid,

    /// Contribution amount in cents
    pub amount_cents: i64,

    /// Payment method (pix or card)
    pub method: PaymentMethod,

    /// Contributor's email, forwarded to the gateway as the payer
    pub payer_email: String,

    /// Card token produced by the gateway's frontend SDK
    ///
    /// Required for card payments; ignored for pix.
    pub card_token: Option<String>,
}

/// Response for the payment status query.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "123456789",
///   "status": "approved",
///   "amount_cents": 10000,
///   "external_reference": "gift_660e8400-e29b-41d4-a716-446655440001",
///   "date_created": "2025-07-31T16:58:46Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    /// Gateway payment id
    pub id: String,

    /// Gateway status, normalized (approved, pending, rejected, cancelled)
    pub status: String,

    /// Settled amount in cents
    pub amount_cents: i64,

    /// External reference correlating the payment to a gift
    pub external_reference: Option<String>,

    /// When the gateway created the payment
    pub date_created: Option<DateTime<Utc>>,
}

/// Webhook notification body posted by the payment gateway.
///
/// The gateway sends only an event envelope; the payment id inside `data`
/// is the single piece of information used. Authoritative status and amount
/// are always re-fetched from the gateway, never trusted from the payload.
///
/// # JSON Example
///
/// ```json
/// {
///   "action": "payment.updated",
///   "type": "payment",
///   "data": { "id": "123456789" }
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct WebhookNotification {
    /// Event action (e.g. "payment.updated"); informational only
    pub action: Option<String>,

    /// Event type; informational only
    #[serde(rename = "type")]
    pub event_type: Option<String>,

    /// Event payload carrying the payment id
    pub data: Option<WebhookNotificationData>,
}

/// `data` portion of the webhook notification.
#[derive(Debug, Deserialize)]
pub struct WebhookNotificationData {
    /// Payment id; the gateway sends this as a number or a string
    /// depending on the notification channel
    pub id: Option<serde_json::Value>,
}

impl WebhookNotification {
    /// Extract the payment id, tolerating both numeric and string forms.
    ///
    /// Returns None when the payload carries no recognizable id.
    pub fn payment_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Acknowledgement returned to the gateway for every webhook delivery.
///
/// Always sent with HTTP 200 so the gateway does not enter a retry storm;
/// `received: false` signals that the notification was not processed and
/// should be redelivered (unknown payment, gateway outage) or was rejected
/// outright (unauthorized source, unparseable payload).
///
/// # JSON Examples
///
/// ```json
/// { "received": true, "status": "approved" }
/// ```
///
/// ```json
/// { "received": false, "reason": "No payment id" }
/// ```
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Whether the notification was processed
    pub received: bool,

    /// Normalized gateway status of the payment, when it was looked up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Why the notification was not processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    /// Notification processed; report the payment's normalized status.
    pub fn processed(status: impl Into<String>) -> Self {
        Self {
            received: true,
            status: Some(status.into()),
            reason: None,
        }
    }

    /// Notification not processed; the gateway may redeliver.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            received: false,
            status: None,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_id_accepts_numeric_form() {
        let notification: WebhookNotification =
            serde_json::from_str(r#"{"data":{"id":123456789}}"#).unwrap();
        assert_eq!(notification.payment_id().as_deref(), Some("123456789"));
    }

    #[test]
    fn payment_id_accepts_string_form() {
        let notification: WebhookNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":"987654"}}"#).unwrap();
        assert_eq!(notification.payment_id().as_deref(), Some("987654"));
    }

    #[test]
    fn payment_id_missing_when_payload_is_unrelated() {
        let notification: WebhookNotification =
            serde_json::from_str(r#"{"action":"test"}"#).unwrap();
        assert_eq!(notification.payment_id(), None);
    }

    #[test]
    fn payment_id_missing_when_id_is_empty() {
        let notification: WebhookNotification =
            serde_json::from_str(r#"{"data":{"id":""}}"#).unwrap();
        assert_eq!(notification.payment_id(), None);
    }

    #[test]
    fn method_deserializes_from_lowercase() {
        let method: PaymentMethod = serde_json::from_str(r#""pix""#).unwrap();
        assert_eq!(method, PaymentMethod::Pix);
        let method: PaymentMethod = serde_json::from_str(r#""card""#).unwrap();
        assert_eq!(method, PaymentMethod::Card);
    }
}
