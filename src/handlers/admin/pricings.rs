use axum::{extract::State, http::StatusCode};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{CreatePricing, Pricing, UpdatePricing};

pub async fn create_pricing(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(input): Json<CreatePricing>,
) -> Result<(StatusCode, Json<Pricing>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest(msg::NAME_REQUIRED.into()));
    }
    if input.amount <= 0 {
        return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
    }
    if input.duration_hours <= 0 {
        return Err(AppError::BadRequest(msg::INVALID_DURATION.into()));
    }

    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let pricing = queries::create_pricing(&conn, &zone_id, &input)?;
    tracing::info!(zone_id = %zone_id, pricing_id = %pricing.id, amount = pricing.amount, "Pricing created");
    Ok((StatusCode::CREATED, Json(pricing)))
}

/// All tiers of a zone, inactive ones included.
pub async fn list_pricings(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<Vec<Pricing>>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    Ok(Json(queries::list_pricings_for_zone(&conn, &zone_id, false)?))
}

pub async fn update_pricing(
    State(state): State<AppState>,
    Path(pricing_id): Path<String>,
    Json(input): Json<UpdatePricing>,
) -> Result<Json<Pricing>> {
    input.validate()?;
    let conn = state.db.get()?;
    let existing =
        queries::get_pricing_by_id(&conn, &pricing_id)?.or_not_found(msg::PRICING_NOT_FOUND)?;
    let pricing = queries::update_pricing(&conn, &pricing_id, &input)?.unwrap_or(existing);
    tracing::info!(
        pricing_id = %pricing.id,
        amount = pricing.amount,
        is_active = pricing.is_active,
        "Pricing updated"
    );
    Ok(Json(pricing))
}

pub async fn delete_pricing(
    State(state): State<AppState>,
    Path(pricing_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    if !queries::delete_pricing(&conn, &pricing_id)? {
        return Err(AppError::NotFound(msg::PRICING_NOT_FOUND.into()));
    }
    tracing::info!(pricing_id = %pricing_id, "Pricing deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}
