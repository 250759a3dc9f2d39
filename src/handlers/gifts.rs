//! Gift registry HTTP handlers.
//!
//! This module implements the gift-related API endpoints:
//! - POST /api/v1/gifts - Add a gift to a wedding
//! - GET /api/v1/gifts/:id/stats - Funding progress for one gift
//! - GET /api/v1/weddings/:wedding_id/gifts - Funding progress for all gifts
//!
//! Wedding management itself lives outside this service; these endpoints
//! only cover the registry entries whose funding this service reconciles.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AuthContext,
    models::gift::{CreateGiftRequest, Gift, GiftStatsResponse},
    services::authorization_service,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Add a gift to a wedding.
///
/// Initializes the funding ledger: nothing paid, remaining balance equal to
/// the price (or zero for unbounded gifts), status pending.
///
/// # Request Body
///
/// ```json
/// {
///   "wedding_id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Cookware set",
///   "description": "Stainless steel, 10 pieces",
///   "photo_url": "https://example.com/cookware.jpg",
///   "price_cents": 29999
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the gift, including the initialized ledger.
///
/// # Security
///
/// - Requires valid API key authentication
/// - Caller must be a member of the wedding
pub async fn create_gift(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateGiftRequest>,
) -> Result<(StatusCode, Json<Gift>), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Gift name must not be empty".to_string(),
        ));
    }

    if let Some(price) = request.price_cents {
        if price <= 0 {
            return Err(AppError::InvalidRequest(
                "Price must be positive".to_string(),
            ));
        }
    }

    if let Some(ref photo_url) = request.photo_url {
        validate_photo_url(photo_url)?;
    }

    // Only wedding members may extend the registry
    authorization_service::ensure_wedding_member(&state.pool, auth.api_key_id, request.wedding_id)
        .await?;

    let gift = sqlx::query_as::<_, Gift>(
        r#"
        INSERT INTO gifts (wedding_id, name, description, photo_url, store, price_cents, amount_remaining_cents)
        VALUES ($1, $2, $3, $4, $5, $6, COALESCE($6, 0))
        RETURNING *
        "#,
    )
    .bind(request.wedding_id)
    .bind(request.name)
    .bind(request.description)
    .bind(request.photo_url)
    .bind(request.store)
    .bind(request.price_cents)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("Gift {} added to wedding {}", gift.id, gift.wedding_id);

    Ok((StatusCode::CREATED, Json(gift)))
}

/// Funding progress for one gift.
///
/// # Response (200)
///
/// ```json
/// {
///   "id": "660e8400-...",
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
pub async fn get_gift_stats(
    State(state): State<AppState>,
    Path(gift_id): Path<Uuid>,
) -> Result<Json<GiftStatsResponse>, AppError> {
    let gift = sqlx::query_as::<_, Gift>(
        "SELECT * FROM gifts WHERE id = $1 AND is_active = true",
    )
    .bind(gift_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::GiftNotFound)?;

    Ok(Json(gift.into()))
}

/// Funding progress for every active gift of a wedding.
///
/// Gifts are returned in reverse chronological order (newest first).
pub async fn list_wedding_gifts(
    State(state): State<AppState>,
    Path(wedding_id): Path<Uuid>,
) -> Result<Json<Vec<GiftStatsResponse>>, AppError> {
    let gifts = sqlx::query_as::<_, Gift>(
        r#"
        SELECT * FROM gifts
        WHERE wedding_id = $1 AND is_active = true
        ORDER BY created_at DESC
        "#,
    )
    .bind(wedding_id)
    .fetch_all(&state.pool)
    .await?;

    let responses: Vec<GiftStatsResponse> = gifts.into_iter().map(Into::into).collect();

    Ok(Json(responses))
}

/// Validate a gift photo URL.
///
/// # Rules
///
/// - Must be a valid URL
/// - Must use HTTP or HTTPS
/// - Maximum 2048 characters
fn validate_photo_url(photo_url: &str) -> Result<(), AppError> {
    if photo_url.len() > 2048 {
        return Err(AppError::InvalidRequest(
            "Photo URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(photo_url)
        .map_err(|_| AppError::InvalidRequest("Invalid photo URL".to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(AppError::InvalidRequest(
            "Photo URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_photo_urls() {
        assert!(validate_photo_url("https://example.com/photo.jpg").is_ok());
        assert!(validate_photo_url("http://example.com/photo.jpg").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes_and_garbage() {
        assert!(validate_photo_url("ftp://example.com/photo.jpg").is_err());
        assert!(validate_photo_url("not a url").is_err());
    }

    #[test]
    fn rejects_oversized_urls() {
        let long = format!("https://example.com/{}", "a".repeat(2048));
        assert!(validate_photo_url(&long).is_err());
    }
}
