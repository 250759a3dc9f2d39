//! Contribution reconciler - the single mutation point for gift ledgers.
//!
//! Every settled contribution, whether it arrives from the direct payment
//! path or from a gateway webhook, is normalized into a `SettlementEvent`
//! and applied here.
//!
//! # Guarantees
//!
//! - `amount_paid_cents` never decreases; `amount_remaining_cents` is
//!   recomputed together with it and clamped to zero
//! - A fully-paid gift is terminal: further events are silent no-ops
//! - Each gateway payment id is credited at most once, even across
//!   duplicate webhook deliveries of partial payments
//! - The ledger update is all-or-nothing: one database transaction covers
//!   the duplicate check and the gift update
//!
//! # Atomicity
//!
//! The gift row is locked with FOR UPDATE for the duration of the
//! read-modify-write cycle, serializing a direct payment racing a webhook
//! (or two webhook retries) for the same gift.

use crate::{db::DbPool, error::AppError, models::gift::Gift};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Normalized contribution fact consumed by the reconciler.
///
/// Produced by either ingestion path after the gateway response qualifies
/// for settlement; consumed exactly once.
#[derive(Debug, Clone)]
pub struct SettlementEvent {
    /// Gateway payment id; the at-most-once key
    pub gateway_payment_id: String,

    /// Settled amount in cents
    pub amount_cents: i64,
}

/// Which ingestion path produced a settlement event.
#[derive(Debug, Clone, Copy)]
pub enum SettlementSource {
    /// Synchronous payment creation
    Direct,
    /// Asynchronous gateway notification
    Webhook,
}

impl SettlementSource {
    fn as_str(&self) -> &'static str {
        match self {
            SettlementSource::Direct => "direct",
            SettlementSource::Webhook => "webhook",
        }
    }
}

/// Computed ledger transition, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub amount_paid_cents: i64,
    pub amount_remaining_cents: i64,
    pub is_fully_paid: bool,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Compute the ledger transition for a settled amount. Pure; no I/O.
///
/// ```text
/// new_paid      = paid + amount
/// new_remaining = max(0, price - new_paid)   (price unset: unchanged)
/// fully_paid    = price set AND new_remaining == 0
/// ```
///
/// When the settlement completes the gift, `payment_status` becomes
/// "completed" and `paid_at` is stamped with `now` (exactly once).
/// Otherwise the status stays "pending" unless the caller overrides it via
/// `status_hint` (e.g. "failed" for ledger repair).
///
/// A gift that is already fully paid is returned unchanged regardless of
/// the amount: the terminal state has no outgoing transition.
pub fn apply_settlement(
    gift: &Gift,
    amount_cents: i64,
    status_hint: Option<&str>,
    now: DateTime<Utc>,
) -> LedgerUpdate {
    if gift.is_fully_paid {
        return LedgerUpdate {
            amount_paid_cents: gift.amount_paid_cents,
            amount_remaining_cents: gift.amount_remaining_cents,
            is_fully_paid: true,
            payment_status: gift.payment_status.clone(),
            paid_at: gift.paid_at,
        };
    }

    // Negative amounts can only come from a misbehaving gateway response;
    // the ledger is monotonic, so they are treated as zero.
    let amount_cents = amount_cents.max(0);

    let new_paid = gift.amount_paid_cents + amount_cents;
    let new_remaining = match gift.price_cents {
        Some(price) => (price - new_paid).max(0),
        // Unbounded gift: remaining stays untouched and completion is
        // never tracked
        None => gift.amount_remaining_cents,
    };
    let fully_paid = gift.price_cents.is_some() && new_remaining == 0;

    if fully_paid {
        LedgerUpdate {
            amount_paid_cents: new_paid,
            amount_remaining_cents: 0,
            is_fully_paid: true,
            payment_status: "completed".to_string(),
            paid_at: gift.paid_at.or(Some(now)),
        }
    } else {
        LedgerUpdate {
            amount_paid_cents: new_paid,
            amount_remaining_cents: new_remaining,
            is_fully_paid: false,
            payment_status: status_hint.unwrap_or("pending").to_string(),
            paid_at: gift.paid_at,
        }
    }
}

/// Apply a settlement event to a gift's ledger.
///
/// # Process
///
/// 1. Start a database transaction
/// 2. Lock the gift row (FOR UPDATE); fail with `GiftNotFound` if the gift
///    is absent or inactive
/// 3. If the gift is already fully paid, return it unchanged - duplicate
///    deliveries of a completed gift's notifications are not errors
/// 4. Record the gateway payment id; if it was already recorded, return the
///    gift unchanged (at-most-once per payment id)
/// 5. Compute and persist the ledger transition
/// 6. Commit (or rollback on error)
///
/// # Errors
///
/// - `GiftNotFound`: gift absent or inactive
/// - `Database`: database error occurred (nothing was applied)
pub async fn reconcile(
    pool: &DbPool,
    gift_id: Uuid,
    event: SettlementEvent,
    source: SettlementSource,
) -> Result<Gift, AppError> {
    let mut tx = pool.begin().await?;

    // Lock the gift for the read-modify-write cycle.
    // FOR UPDATE serializes concurrent settlements for the same gift.
    let gift = sqlx::query_as::<_, Gift>(
        "SELECT * FROM gifts WHERE id = $1 AND is_active = true FOR UPDATE",
    )
    .bind(gift_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::GiftNotFound)?;

    if gift.is_fully_paid {
        tx.rollback().await?;
        tracing::info!(
            "Gift {} already fully paid; ignoring payment {}",
            gift_id,
            event.gateway_payment_id
        );
        return Ok(gift);
    }

    // At-most-once guard: record the payment id; a conflict means this
    // payment was already credited (duplicate webhook delivery, or the
    // webhook racing the direct path for the same charge).
    let inserted = sqlx::query(
        r#"
        INSERT INTO gift_payments (gift_id, gateway_payment_id, amount_cents, source)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (gateway_payment_id) DO NOTHING
        "#,
    )
    .bind(gift_id)
    .bind(&event.gateway_payment_id)
    .bind(event.amount_cents.max(0))
    .bind(source.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        tracing::info!(
            "Payment {} already applied to gift {}; ignoring duplicate",
            event.gateway_payment_id,
            gift_id
        );
        return Ok(gift);
    }

    let update = apply_settlement(&gift, event.amount_cents, None, Utc::now());

    let updated = sqlx::query_as::<_, Gift>(
        r#"
        UPDATE gifts
        SET amount_paid_cents = $1,
            amount_remaining_cents = $2,
            is_fully_paid = $3,
            payment_status = $4,
            paid_at = $5,
            updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(update.amount_paid_cents)
    .bind(update.amount_remaining_cents)
    .bind(update.is_fully_paid)
    .bind(&update.payment_status)
    .bind(update.paid_at)
    .bind(gift_id)
    .fetch_one(&mut *tx)
    .await?;

    // Commit the payment record and the ledger update atomically
    tx.commit().await?;

    if updated.is_fully_paid {
        tracing::info!("Gift {} fully paid", gift_id);
    } else {
        tracing::info!(
            "Gift {} partially paid: {}/{:?} cents",
            gift_id,
            updated.amount_paid_cents,
            updated.price_cents
        );
    }

    Ok(updated)
}

/// External reference attached to every gateway charge: `gift_<uuid>`.
pub fn format_gift_reference(gift_id: Uuid) -> String {
    format!("gift_{gift_id}")
}

/// Parse a `gift_<uuid>` external reference back into a gift id.
///
/// Returns None for anything that does not match the format; callers treat
/// such references as events that do not belong to this system.
pub fn parse_gift_reference(reference: &str) -> Option<Uuid> {
    let raw = reference.strip_prefix("gift_")?;
    Uuid::parse_str(raw).ok()
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

    fn fully_paid_gift(price_cents: i64) -> Gift {
        let mut g = gift(Some(price_cents), price_cents);
        g.amount_remaining_cents = 0;
        g.is_fully_paid = true;
        g.payment_status = "completed".to_string();
        g.paid_at = Some(Utc::now());
        g
    }

    fn apply(gift: &Gift, amount: i64) -> LedgerUpdate {
        apply_settlement(gift, amount, None, Utc::now())
    }

    #[test]
    fn partial_settlement_keeps_ledger_balanced() {
        // Gift priced at 300.00, contribution of 100.00 via pending pix
        let update = apply(&gift(Some(30000), 0), 10000);

        assert_eq!(update.amount_paid_cents, 10000);
        assert_eq!(update.amount_remaining_cents, 20000);
        assert!(!update.is_fully_paid);
        assert_eq!(update.payment_status, "pending");
        assert_eq!(update.paid_at, None);
    }

    #[test]
    fn completing_settlement_flips_terminal_state_once() {
        // Same gift after the first contribution; second contribution of
        // 200.00 completes it
        let update = apply(&gift(Some(30000), 10000), 20000);

        assert_eq!(update.amount_paid_cents, 30000);
        assert_eq!(update.amount_remaining_cents, 0);
        assert!(update.is_fully_paid);
        assert_eq!(update.payment_status, "completed");
        assert!(update.paid_at.is_some());
    }

    #[test]
    fn invariant_holds_after_every_step() {
        // paid + remaining == price after each settlement in a sequence
        // summing to the price
        let price = 30000;
        let mut g = gift(Some(price), 0);
        for amount in [5000, 12000, 3000, 10000] {
            let update = apply(&g, amount);
            assert_eq!(
                update.amount_paid_cents + update.amount_remaining_cents,
                price
            );
            g.amount_paid_cents = update.amount_paid_cents;
            g.amount_remaining_cents = update.amount_remaining_cents;
            g.is_fully_paid = update.is_fully_paid;
            g.payment_status = update.payment_status;
            g.paid_at = update.paid_at;
        }
        assert!(g.is_fully_paid);
    }

    #[test]
    fn zero_amount_settlement_is_a_no_op() {
        let g = gift(Some(30000), 10000);
        let update = apply(&g, 0);

        assert_eq!(update.amount_paid_cents, 10000);
        assert_eq!(update.amount_remaining_cents, 20000);
        assert!(!update.is_fully_paid);
    }

    #[test]
    fn negative_amount_never_decreases_paid() {
        let g = gift(Some(30000), 10000);
        let update = apply(&g, -5000);

        assert_eq!(update.amount_paid_cents, 10000);
        assert_eq!(update.amount_remaining_cents, 20000);
    }

    #[test]
    fn fully_paid_gift_is_terminal() {
        let g = fully_paid_gift(30000);
        let original_paid_at = g.paid_at;
        let update = apply(&g, 5000);

        assert_eq!(update.amount_paid_cents, 30000);
        assert_eq!(update.amount_remaining_cents, 0);
        assert!(update.is_fully_paid);
        assert_eq!(update.payment_status, "completed");
        assert_eq!(update.paid_at, original_paid_at);
    }

    #[test]
    fn overpayment_clamps_remaining_to_zero() {
        // Webhook amounts are authoritative and may exceed the remaining
        // balance; remaining never goes negative
        let update = apply(&gift(Some(30000), 25000), 10000);

        assert_eq!(update.amount_paid_cents, 35000);
        assert_eq!(update.amount_remaining_cents, 0);
        assert!(update.is_fully_paid);
    }

    #[test]
    fn unbounded_gift_accumulates_without_completing() {
        let update = apply(&gift(None, 50000), 25000);

        assert_eq!(update.amount_paid_cents, 75000);
        assert_eq!(update.amount_remaining_cents, 0);
        assert!(!update.is_fully_paid);
        assert_eq!(update.payment_status, "pending");
    }

    #[test]
    fn status_hint_overrides_non_terminal_status() {
        let update = apply_settlement(&gift(Some(30000), 0), 0, Some("failed"), Utc::now());
        assert_eq!(update.payment_status, "failed");
        assert!(!update.is_fully_paid);
    }

    #[test]
    fn status_hint_cannot_override_completion() {
        let update =
            apply_settlement(&gift(Some(30000), 10000), 20000, Some("failed"), Utc::now());
        assert_eq!(update.payment_status, "completed");
        assert!(update.is_fully_paid);
    }

    #[test]
    fn gift_reference_round_trips() {
        let id = Uuid::new_v4();
        assert_eq!(parse_gift_reference(&format_gift_reference(id)), Some(id));
    }

    #[test]
    fn malformed_references_do_not_parse() {
        assert_eq!(parse_gift_reference("bogus"), None);
        assert_eq!(parse_gift_reference("gift_"), None);
        assert_eq!(parse_gift_reference("gift_notauuid"), None);
        assert_eq!(parse_gift_reference(""), None);
    }
}
