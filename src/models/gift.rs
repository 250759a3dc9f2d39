//! Gift data models and API request/response types.
//!
//! This module defines:
//! - `Gift`: Database entity carrying the per-gift funding ledger
//! - `CreateGiftRequest`: Request body for adding a gift to a wedding
//! - `GiftStatsResponse`: Funding progress returned to clients
//!
//! # The funding ledger
//!
//! Each gift tracks how much guests have contributed toward its price:
//!
//! - `amount_paid_cents` only ever grows
//! - `amount_remaining_cents` is derived (`price - paid`, clamped to zero)
//!   and is never set independently of `amount_paid_cents`
//! - `is_fully_paid` is terminal: once true it never reverts, and `paid_at`
//!   records the moment of the transition exactly once
//!
//! Ledger fields are mutated exclusively by the reconciliation service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a gift record from the database.
///
/// # Database Table
///
/// Maps to the `gifts` table. Each gift:
/// - Belongs to one wedding (via `wedding_id`)
/// - Stores all amounts in cents (never floats!)
/// - Has an optional price; a NULL price means contributions are unbounded
///   and completion is never tracked
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Gift {
    /// Unique identifier for this gift
    pub id: Uuid,

    /// Wedding this gift belongs to
    pub wedding_id: Uuid,

    /// Gift name shown to guests
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Optional URL of a photo of the gift
    pub photo_url: Option<String>,

    /// Optional store where the gift can be found
    pub store: Option<String>,

    /// Target price in cents
    ///
    /// None means the gift has no funding target: contributions accumulate
    /// but the gift never becomes "fully paid".
    pub price_cents: Option<i64>,

    /// Cumulative settled contributions in cents
    ///
    /// Monotonically non-decreasing; >= 0 (enforced by CHECK constraint).
    pub amount_paid_cents: i64,

    /// Remaining balance in cents, derived from price and amount paid
    ///
    /// Clamped to zero; never negative.
    pub amount_remaining_cents: i64,

    /// Whether the gift has been fully funded
    ///
    /// Terminal: once true, no settlement event changes the ledger again.
    pub is_fully_paid: bool,

    /// Funding status
    ///
    /// - "pending": contributions still accepted
    /// - "completed": fully funded (set together with `is_fully_paid`)
    /// - "failed": marked failed by an explicit status override
    pub payment_status: String,

    /// When the gift became fully funded
    ///
    /// Set exactly once, on the false→true transition of `is_fully_paid`.
    pub paid_at: Option<DateTime<Utc>>,

    /// Whether the gift is active
    ///
    /// Inactive gifts are invisible to the payment paths. The flag is owned
    /// by the surrounding registry management, not by this service.
    pub is_active: bool,

    /// When the gift was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of the last ledger update
    pub updated_at: DateTime<Utc>,
}

/// Request body for adding a gift to a wedding.
///
/// # JSON Example
///
/// ```json
/// {
///   "wedding_id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Cookware set",
///   "description": "Stainless steel, 10 pieces",
///   "photo_url": "https://example.com/cookware.jpg",
///   "store": "Casa & Cozinha",
///   "price_cents": 29999
/// }
/// ```
///
/// # Validation
///
/// - `name`: Required, non-empty
/// - `price_cents`: Optional; must be positive when present
/// - `photo_url`: Optional; must parse as an HTTP(S) URL when present
#[derive(Debug, Deserialize)]
pub struct CreateGiftRequest {
    /// Wedding to attach the gift to
    pub wedding_id: Uuid,

    /// Gift name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Optional photo URL
    pub photo_url: Option<String>,

    /// Optional store name
    pub store: Option<String>,

    /// Optional target price in cents
    pub price_cents: Option<i64>,
}

/// Funding progress for a gift, returned to API clients.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "660e8400-e29b-41d4-a716-446655440001",
///   "name": "Cookware set",
///   "price_cents": 30000,
///   "amount_paid_cents": 10000,
///   "amount_remaining_cents": 20000,
///   "is_fully_paid": false,
///   "progress_percentage": 33.33,
///   "payment_status": "pending",
///   "paid_at": null
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct GiftStatsResponse {
    pub id: Uuid,
    pub name: String,
    pub price_cents: Option<i64>,
    pub amount_paid_cents: i64,
    pub amount_remaining_cents: i64,
    pub is_fully_paid: bool,
    /// Percent funded, rounded to two decimal places; 0 for unbounded gifts
    pub progress_percentage: f64,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Convert database Gift to API GiftStatsResponse.
///
/// Computes the funding percentage and drops internal fields (wedding link,
/// active flag, timestamps) that stats consumers don't need.
impl From<Gift> for GiftStatsResponse {
    fn from(gift: Gift) -> Self {
        let progress_percentage = match gift.price_cents {
            Some(price) if price > 0 => {
                round2(gift.amount_paid_cents as f64 / price as f64 * 100.0)
            }
            _ => 0.0,
        };

        Self {
            id: gift.id,
            name: gift.name,
            price_cents: gift.price_cents,
            amount_paid_cents: gift.amount_paid_cents,
            amount_remaining_cents: gift.amount_remaining_cents,
            is_fully_paid: gift.is_fully_paid,
            progress_percentage,
            payment_status: gift.payment_status,
            paid_at: gift.paid_at,
        }
    }
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn gift_with(price_cents: Option<i64>, amount_paid_cents: i64) -> Gift {
        let remaining = price_cents.map(|p| (p - amount_paid_cents).max(0)).unwrap_or(0);
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

    #[test]
    fn progress_is_rounded_to_two_decimals() {
        let stats = GiftStatsResponse::from(gift_with(Some(30000), 10000));
        assert_eq!(stats.progress_percentage, 33.33);
    }

    #[test]
    fn progress_of_unbounded_gift_is_zero() {
        let stats = GiftStatsResponse::from(gift_with(None, 12345));
        assert_eq!(stats.progress_percentage, 0.0);
    }

    #[test]
    fn progress_of_untouched_gift_is_zero() {
        let stats = GiftStatsResponse::from(gift_with(Some(30000), 0));
        assert_eq!(stats.progress_percentage, 0.0);
    }

    #[test]
    fn progress_of_fully_funded_gift_is_hundred() {
        let stats = GiftStatsResponse::from(gift_with(Some(30000), 30000));
        assert_eq!(stats.progress_percentage, 100.0);
    }
}
