//! Direct contribution path - synchronous payment creation.
//!
//! A guest contributes toward a gift: the gift is validated, a charge is
//! created at the gateway, and when the immediate response qualifies for
//! settlement the gift ledger is credited in the same request.
//!
//! # Validation Order
//!
//! All ledger validation happens BEFORE the gateway is contacted. A charge
//! that cannot be reconciled (gift gone, already funded, amount exceeding
//! the remaining balance) must never be created, because the money would
//! land with no gift to credit.
//!
//! # Settlement
//!
//! The raw gateway response is returned to the caller whether or not
//! settlement occurred. Card charges typically come back `pending` and
//! settle later through the webhook path; the caller must not read a
//! `pending` response as completion.

use crate::{
    db::DbPool,
    error::AppError,
    gateway::{ChargeRequest, CreatedPayment, PaymentGateway, SettlementOutcome, settlement_outcome},
    models::{gift::Gift, payment::{CreatePaymentRequest, PaymentMethod}},
    services::{authorization_service, reconciliation_service},
};
use uuid::Uuid;

/// Create a contribution toward a gift.
///
/// # Process
///
/// 1. Load the gift (active only)
/// 2. Verify the caller is a member of the wedding owning it
/// 3. Validate the contribution against the ledger (no gateway call yet)
/// 4. Create the charge at the gateway
/// 5. Settle immediately when the response qualifies (approved, or
///    pending pix)
///
/// # Errors
///
/// - `GiftNotFound`: gift absent or inactive
/// - `NotWeddingMember`: caller has no relation to the wedding
/// - `GiftAlreadyPaid` / `AmountExceedsRemaining` / `InvalidRequest`:
///   ledger validation failed; the gateway was not contacted
/// - `GatewayRejected` / `GatewayUnavailable`: charge creation failed;
///   gift state is unchanged
pub async fn create_contribution(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    api_key_id: Uuid,
    request: CreatePaymentRequest,
) -> Result<CreatedPayment, AppError> {
    let gift = sqlx::query_as::<_, Gift>(
        "SELECT * FROM gifts WHERE id = $1 AND is_active = true",
    )
    .bind(request.gift_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::GiftNotFound)?;

    // Capability check before any gateway interaction
    authorization_service::ensure_wedding_member(pool, api_key_id, gift.wedding_id).await?;

    // Ledger pre-validation; the adapter must never be invoked when the
    // contribution cannot be reconciled
    validate_contribution(&gift, &request)?;

    tracing::info!(
        "Creating payment for gift {}, amount: {} cents, method: {:?}",
        request.gift_id,
        request.amount_cents,
        request.method
    );

    let charge = ChargeRequest {
        amount_cents: request.amount_cents,
        method: request.method,
        payer_email: request.payer_email,
        description: format!("Contribution to gift: {}", gift.name),
        external_reference: reconciliation_service::format_gift_reference(gift.id),
        card_token: request.card_token,
    };

    let created = gateway.create_payment(charge).await?;

    if settlement_outcome(created.status, Some(request.method)) == SettlementOutcome::Settle {
        reconciliation_service::reconcile(
            pool,
            gift.id,
            reconciliation_service::SettlementEvent {
                gateway_payment_id: created.id.clone(),
                amount_cents: created.amount_cents,
            },
            reconciliation_service::SettlementSource::Direct,
        )
        .await?;
    } else {
        tracing::info!(
            "Payment {} not settled immediately (status {:?}); awaiting webhook",
            created.id,
            created.status
        );
    }

    Ok(created)
}

/// Validate a contribution against the gift ledger. Pure; no I/O.
///
/// # Rules
///
/// - The gift must not be fully paid
/// - The amount must be positive
/// - For priced gifts, the amount must not exceed the remaining balance
/// - Card payments must carry a card token
fn validate_contribution(gift: &Gift, request: &CreatePaymentRequest) -> Result<(), AppError> {
    if gift.is_fully_paid {
        return Err(AppError::GiftAlreadyPaid);
    }

    if request.amount_cents <= 0 {
        return Err(AppError::InvalidRequest(
            "Amount must be positive".to_string(),
        ));
    }

    if gift.price_cents.is_some() && request.amount_cents > gift.amount_remaining_cents {
        return Err(AppError::AmountExceedsRemaining);
    }

    if request.method == PaymentMethod::Card && request.card_token.is_none() {
        return Err(AppError::InvalidRequest(
            "Card payments require card_token".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn gift(price_cents: Option<i64>, amount_paid_cents: i64) -> Gift {
        let remaining = price_cents
            .map(|p| (p - amount_paid_cents).max(0))
            .unwrap_or(0);
        Gift {
            id: Uuid::new_v4(),
            wedding_id: Uuid::new_v4(),
            name: "Cookware set".to_string(),
            description: None,
            photo_url: None,
            store: None,
            price_cents,
            amount_paid_cents,
            amount_remaining_cents: remaining,
            is_fully_paid: false,
            payment_status: "pending".to_string(),
            paid_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pix_request(gift_id: Uuid, amount_cents: i64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            gift_id,
            amount_cents,
            method: PaymentMethod::Pix,
            payer_email: "guest@example.com".to_string(),
            card_token: None,
        }
    }

    #[test]
    fn accepts_contribution_within_remaining_balance() {
        let g = gift(Some(30000), 10000);
        assert!(validate_contribution(&g, &pix_request(g.id, 20000)).is_ok());
    }

    #[test]
    fn rejects_contribution_exceeding_remaining_balance() {
        let g = gift(Some(30000), 25000);
        let err = validate_contribution(&g, &pix_request(g.id, 10000)).unwrap_err();
        assert!(matches!(err, AppError::AmountExceedsRemaining));
    }

    #[test]
    fn rejects_contribution_when_nothing_remains() {
        // Remaining balance is zero but the fully-paid flag has not been
        // set (e.g. unpersisted state): any positive amount exceeds zero
        let mut g = gift(Some(30000), 30000);
        g.is_fully_paid = false;
        let err = validate_contribution(&g, &pix_request(g.id, 5000)).unwrap_err();
        assert!(matches!(err, AppError::AmountExceedsRemaining));
    }

    #[test]
    fn rejects_fully_paid_gift() {
        let mut g = gift(Some(30000), 30000);
        g.is_fully_paid = true;
        let err = validate_contribution(&g, &pix_request(g.id, 100)).unwrap_err();
        assert!(matches!(err, AppError::GiftAlreadyPaid));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let g = gift(Some(30000), 0);
        assert!(matches!(
            validate_contribution(&g, &pix_request(g.id, 0)),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_contribution(&g, &pix_request(g.id, -100)),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rejects_card_payment_without_token() {
        let g = gift(Some(30000), 0);
        let request = CreatePaymentRequest {
            gift_id: g.id,
            amount_cents: 10000,
            method: PaymentMethod::Card,
            payer_email: "guest@example.com".to_string(),
            card_token: None,
        };
        assert!(matches!(
            validate_contribution(&g, &request),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn unbounded_gift_accepts_any_positive_amount() {
        let g = gift(None, 500000);
        assert!(validate_contribution(&g, &pix_request(g.id, 1000000)).is_ok());
    }
}
