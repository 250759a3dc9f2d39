//! Wedding membership capability check.
//!
//! Contributing toward a gift (or adding one) requires a relation to the
//! wedding that owns it: one of the engaged couple (`fiance`) or a guest
//! whose invitation was accepted (`guest_accepted`). The check runs before
//! the gateway or the reconciler is ever reached.

use crate::{db::DbPool, error::AppError};
use uuid::Uuid;

/// Verify the caller holds a membership relation to the wedding.
///
/// # Errors
///
/// - `NotWeddingMember`: no relation exists
/// - `Database`: database error occurred
pub async fn ensure_wedding_member(
    pool: &DbPool,
    api_key_id: Uuid,
    wedding_id: Uuid,
) -> Result<(), AppError> {
    let is_member: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM wedding_members WHERE wedding_id = $1 AND api_key_id = $2)",
    )
    .bind(wedding_id)
    .bind(api_key_id)
    .fetch_one(pool)
    .await?;

    if !is_member {
        return Err(AppError::NotWeddingMember);
    }

    Ok(())
}
