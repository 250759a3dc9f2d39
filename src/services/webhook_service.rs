//! Webhook ingestion path - asynchronous gateway notifications.
//!
//! The gateway posts an event envelope carrying only a payment id. The
//! authoritative status and amount are always re-fetched from the gateway;
//! nothing in the notification body is trusted beyond the id.
//!
//! # Processing Steps
//!
//! 1. Verify the notification origin (fail closed)
//! 2. Extract the payment id from the payload
//! 3. Fetch the payment's authoritative state via the gateway adapter
//! 4. Resolve the external reference to a gift
//! 5. Settle through the reconciler when the status qualifies
//!
//! # Acknowledgements
//!
//! Every delivery is acknowledged with HTTP 200 to avoid gateway retry
//! storms. `received: false` marks notifications that were not processed:
//! the gateway redelivers those (which is desired for transient failures
//! and harmless for rejected ones, since rejection is deterministic).

use crate::{
    db::DbPool,
    error::AppError,
    gateway::{PaymentGateway, SettlementOutcome, settlement_outcome},
    models::payment::{WebhookAck, WebhookNotification},
    services::reconciliation_service::{
        self, SettlementEvent, SettlementSource, parse_gift_reference,
    },
};
use axum::http::{HeaderMap, header};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Marker the gateway sends in its User-Agent header.
const GATEWAY_USER_AGENT_MARKER: &str = "MercadoPago";

/// Header carrying the notification signature.
const SIGNATURE_HEADER: &str = "x-signature";

/// Process one webhook delivery and produce the acknowledgement.
///
/// Never returns an error: every failure mode is folded into the ack so
/// the HTTP handler can always answer 200.
pub async fn process_notification(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    webhook_secret: Option<&str>,
    headers: &HeaderMap,
    body: &str,
) -> WebhookAck {
    // Fail closed: notifications from an unrecognized origin are never
    // processed
    if !verify_origin(headers, webhook_secret, body) {
        tracing::warn!(
            "Webhook received from unknown source: {:?}",
            headers.get(header::USER_AGENT)
        );
        return WebhookAck::rejected("Unauthorized source");
    }

    let payment_id = match serde_json::from_str::<WebhookNotification>(body) {
        Ok(notification) => {
            tracing::debug!(
                "Webhook event: action={:?}, type={:?}",
                notification.action,
                notification.event_type
            );
            notification.payment_id()
        }
        Err(_) => None,
    };
    let Some(payment_id) = payment_id else {
        tracing::info!("Webhook received without payment id");
        return WebhookAck::rejected("No payment id");
    };

    tracing::info!("Webhook received for payment {}", payment_id);

    // The notification carries no trustworthy state; ask the gateway
    let lookup = match gateway.fetch_payment_status(&payment_id).await {
        Ok(lookup) => lookup,
        Err(AppError::PaymentNotFound) => {
            tracing::warn!("Payment {} not found at gateway", payment_id);
            return WebhookAck::rejected("Payment not found at gateway");
        }
        Err(e) => {
            tracing::error!("Error fetching payment {}: {}", payment_id, e);
            return WebhookAck::rejected("Gateway unavailable");
        }
    };

    let status = lookup.status.as_str();

    match settlement_outcome(lookup.status, lookup.method) {
        SettlementOutcome::Settle => {
            let Some(gift_id) = lookup
                .external_reference
                .as_deref()
                .and_then(parse_gift_reference)
            else {
                // Not a payment this system created; redelivery would never
                // help, so acknowledge and move on
                tracing::warn!(
                    "Invalid external reference for payment {}: {:?}",
                    payment_id,
                    lookup.external_reference
                );
                return WebhookAck::processed(status);
            };

            let event = SettlementEvent {
                gateway_payment_id: lookup.id,
                amount_cents: lookup.amount_cents,
            };
            match reconciliation_service::reconcile(
                pool,
                gift_id,
                event,
                SettlementSource::Webhook,
            )
            .await
            {
                Ok(_) => WebhookAck::processed(status),
                Err(AppError::GiftNotFound) => {
                    // Gift deactivated since the charge was created
                    tracing::warn!(
                        "Payment {} references missing gift {}",
                        payment_id,
                        gift_id
                    );
                    WebhookAck::processed(status)
                }
                Err(e) => {
                    // Nothing was applied; ask the gateway to redeliver
                    tracing::error!(
                        "Failed to reconcile payment {} for gift {}: {}",
                        payment_id,
                        gift_id,
                        e
                    );
                    WebhookAck::rejected("Internal error")
                }
            }
        }
        SettlementOutcome::Declined => {
            tracing::info!("Payment {} was {}", payment_id, status);
            WebhookAck::processed(status)
        }
        SettlementOutcome::Defer => {
            tracing::info!(
                "Payment {} still {}; awaiting a definitive notification",
                payment_id,
                status
            );
            WebhookAck::processed(status)
        }
    }
}

/// Verify a notification's origin. Fail closed.
///
/// The User-Agent must carry the gateway marker. When a webhook secret is
/// configured, the `x-signature` header must additionally carry a valid
/// HMAC-SHA256 of the raw body (`sha256=<hex>`), compared in constant
/// time.
fn verify_origin(headers: &HeaderMap, webhook_secret: Option<&str>, body: &str) -> bool {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !user_agent.contains(GATEWAY_USER_AGENT_MARKER) {
        return false;
    }

    let Some(secret) = webhook_secret else {
        return true;
    };

    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(provided) = signature.trim().strip_prefix("sha256=") else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(body.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_user_agent(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, user_agent.parse().unwrap());
        headers
    }

    fn sign(secret: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn origin_rejected_without_user_agent() {
        assert!(!verify_origin(&HeaderMap::new(), None, "{}"));
    }

    #[test]
    fn origin_rejected_for_foreign_user_agent() {
        let headers = headers_with_user_agent("curl/8.0");
        assert!(!verify_origin(&headers, None, "{}"));
    }

    #[test]
    fn origin_accepted_by_marker_when_no_secret_configured() {
        let headers = headers_with_user_agent("MercadoPago WebHook v1.0");
        assert!(verify_origin(&headers, None, "{}"));
    }

    #[test]
    fn origin_rejected_when_secret_configured_but_signature_missing() {
        let headers = headers_with_user_agent("MercadoPago WebHook v1.0");
        assert!(!verify_origin(&headers, Some("topsecret"), "{}"));
    }

    #[test]
    fn origin_accepted_with_valid_signature() {
        let body = r#"{"data":{"id":123}}"#;
        let mut headers = headers_with_user_agent("MercadoPago WebHook v1.0");
        headers.insert(
            SIGNATURE_HEADER,
            sign("topsecret", body).parse().unwrap(),
        );
        assert!(verify_origin(&headers, Some("topsecret"), body));
    }

    #[test]
    fn origin_rejected_with_tampered_body() {
        let mut headers = headers_with_user_agent("MercadoPago WebHook v1.0");
        headers.insert(
            SIGNATURE_HEADER,
            sign("topsecret", r#"{"data":{"id":123}}"#).parse().unwrap(),
        );
        assert!(!verify_origin(
            &headers,
            Some("topsecret"),
            r#"{"data":{"id":999}}"#
        ));
    }

    #[test]
    fn origin_rejected_with_malformed_signature() {
        let mut headers = headers_with_user_agent("MercadoPago WebHook v1.0");
        headers.insert(SIGNATURE_HEADER, "not-a-signature".parse().unwrap());
        assert!(!verify_origin(&headers, Some("topsecret"), "{}"));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
