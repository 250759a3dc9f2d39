//! Payment gateway adapter.
//!
//! Defines the interface the rest of the service uses to talk to the
//! external payment processor, plus the normalized types crossing that
//! boundary. Concrete processor integrations live in submodules.
//!
//! # Unit contract
//!
//! Everything above this boundary works in integer cents. The adapter is
//! the single place that converts to and from whatever representation the
//! processor's wire format requires. No caller may scale an amount.
//!
//! # Status vocabulary
//!
//! Processor status strings are translated once, here, into the closed
//! `GatewayStatus` enum. Raw status strings never cross the adapter
//! boundary.

/// Mercado Pago integration
pub mod mercadopago;

use crate::error::AppError;
use crate::models::payment::PaymentMethod;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Normalized payment status at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Charge approved; funds settled
    Approved,
    /// Charge created but not yet settled
    Pending,
    /// Processor declined the charge
    Rejected,
    /// Charge was cancelled
    Cancelled,
    /// Status string not in the known vocabulary; logged, never settled
    Unknown,
}

impl GatewayStatus {
    /// Normalized lowercase form, used in API responses and webhook acks.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayStatus::Approved => "approved",
            GatewayStatus::Pending => "pending",
            GatewayStatus::Rejected => "rejected",
            GatewayStatus::Cancelled => "cancelled",
            GatewayStatus::Unknown => "unknown",
        }
    }
}

/// What a gateway status means for the gift ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Credit the gift ledger now
    Settle,
    /// Not settled yet; a later webhook will carry the final status
    Defer,
    /// Charge declined or cancelled; log only, never mutate the ledger
    Declined,
}

/// Map a gateway status (and the payment method, when known) to a
/// settlement outcome.
///
/// `approved` settles unconditionally. `pending` settles only for pix,
/// which is deferred but typically honored; pending card charges wait for
/// the webhook. Unknown statuses are treated like pending non-pix: no
/// mutation until the gateway reports something definitive.
pub fn settlement_outcome(
    status: GatewayStatus,
    method: Option<PaymentMethod>,
) -> SettlementOutcome {
    match (status, method) {
        (GatewayStatus::Approved, _) => SettlementOutcome::Settle,
        (GatewayStatus::Pending, Some(PaymentMethod::Pix)) => SettlementOutcome::Settle,
        (GatewayStatus::Pending, _) => SettlementOutcome::Defer,
        (GatewayStatus::Rejected, _) | (GatewayStatus::Cancelled, _) => {
            SettlementOutcome::Declined
        }
        (GatewayStatus::Unknown, _) => SettlementOutcome::Defer,
    }
}

/// Charge creation request passed to the adapter.
///
/// Amounts are in cents; the adapter converts to the processor's format.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Amount to charge, in cents
    pub amount_cents: i64,

    /// Payment method
    pub method: PaymentMethod,

    /// Payer email forwarded to the processor
    pub payer_email: String,

    /// Human-readable charge description
    pub description: String,

    /// External reference correlating the charge to a gift (`gift_<uuid>`)
    pub external_reference: String,

    /// Card token, required for card charges
    pub card_token: Option<String>,
}

/// Result of creating a charge at the gateway.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    /// Gateway payment id
    pub id: String,

    /// Normalized status of the immediate response
    pub status: GatewayStatus,

    /// Amount the gateway acknowledged, in cents
    pub amount_cents: i64,

    /// Full gateway response body, passed through to the API caller
    ///
    /// Pix responses carry the QR code and copy-paste payload here; the
    /// service itself only reads the normalized fields above.
    pub raw: serde_json::Value,
}

/// Authoritative payment state fetched from the gateway by id.
#[derive(Debug, Clone)]
pub struct PaymentLookup {
    /// Gateway payment id
    pub id: String,

    /// Normalized payment status
    pub status: GatewayStatus,

    /// Settled amount in cents
    pub amount_cents: i64,

    /// Payment method, when the processor reports one we recognize
    pub method: Option<PaymentMethod>,

    /// External reference attached at charge creation
    pub external_reference: Option<String>,

    /// When the processor created the payment
    pub date_created: Option<DateTime<Utc>>,
}

/// Interface to the external payment processor.
///
/// One configured instance is constructed at startup and shared by the
/// direct payment path and the webhook path.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge.
    ///
    /// # Errors
    ///
    /// - `GatewayUnavailable`: network error, auth failure, timeout, or
    ///   processor outage. The charge may still be in flight.
    /// - `GatewayRejected`: the processor declined the request.
    async fn create_payment(&self, charge: ChargeRequest) -> Result<CreatedPayment, AppError>;

    /// Fetch the authoritative state of a payment by gateway id.
    ///
    /// # Errors
    ///
    /// - `PaymentNotFound`: the gateway has no record of this id.
    /// - `GatewayUnavailable`: network error, auth failure, or timeout.
    async fn fetch_payment_status(&self, payment_id: &str) -> Result<PaymentLookup, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_settles_regardless_of_method() {
        assert_eq!(
            settlement_outcome(GatewayStatus::Approved, Some(PaymentMethod::Card)),
            SettlementOutcome::Settle
        );
        assert_eq!(
            settlement_outcome(GatewayStatus::Approved, Some(PaymentMethod::Pix)),
            SettlementOutcome::Settle
        );
        assert_eq!(
            settlement_outcome(GatewayStatus::Approved, None),
            SettlementOutcome::Settle
        );
    }

    #[test]
    fn pending_pix_settles_optimistically() {
        assert_eq!(
            settlement_outcome(GatewayStatus::Pending, Some(PaymentMethod::Pix)),
            SettlementOutcome::Settle
        );
    }

    #[test]
    fn pending_card_defers_to_webhook() {
        assert_eq!(
            settlement_outcome(GatewayStatus::Pending, Some(PaymentMethod::Card)),
            SettlementOutcome::Defer
        );
        assert_eq!(
            settlement_outcome(GatewayStatus::Pending, None),
            SettlementOutcome::Defer
        );
    }

    #[test]
    fn rejected_and_cancelled_never_settle() {
        assert_eq!(
            settlement_outcome(GatewayStatus::Rejected, Some(PaymentMethod::Pix)),
            SettlementOutcome::Declined
        );
        assert_eq!(
            settlement_outcome(GatewayStatus::Cancelled, Some(PaymentMethod::Card)),
            SettlementOutcome::Declined
        );
    }

    #[test]
    fn unknown_status_defers() {
        assert_eq!(
            settlement_outcome(GatewayStatus::Unknown, Some(PaymentMethod::Pix)),
            SettlementOutcome::Defer
        );
    }
}
