use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{CreateZone, Pricing, TicketStats, UpdateZone, Zone};

#[derive(Debug, Serialize)]
pub struct ZoneDetail {
    #[serde(flatten)]
    pub zone: Zone,
    pub pricings: Vec<Pricing>,
    pub tickets: TicketStats,
}

pub async fn create_zone(
    State(state): State<AppState>,
    Json(input): Json<CreateZone>,
) -> Result<(StatusCode, Json<Zone>)> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest(msg::NAME_REQUIRED.into()));
    }
    let conn = state.db.get()?;
    let zone = queries::create_zone(&conn, &input)?;
    tracing::info!(zone_id = %zone.id, name = %zone.name, "Zone created");
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn list_zones(State(state): State<AppState>) -> Result<Json<Vec<Zone>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_zones(&conn)?))
}

pub async fn get_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<ZoneDetail>> {
    let conn = state.db.get()?;
    let zone = queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let pricings = queries::list_pricings_for_zone(&conn, &zone.id, false)?;
    let tickets = queries::get_ticket_stats(&conn, &zone.id)?;
    Ok(Json(ZoneDetail {
        zone,
        pricings,
        tickets,
    }))
}

pub async fn update_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(input): Json<UpdateZone>,
) -> Result<Json<Zone>> {
    input.validate()?;
    let conn = state.db.get()?;
    let existing = queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let zone = queries::update_zone(&conn, &zone_id, &input)?.unwrap_or(existing);
    tracing::info!(zone_id = %zone.id, "Zone updated");
    Ok(Json(zone))
}

/// Removes the zone with its pricings and tickets. A zone that has sold
/// anything is kept: 409.
pub async fn delete_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    if !queries::delete_zone(&conn, &zone_id)? {
        return Err(AppError::Conflict(msg::ZONE_HAS_PAYMENTS.into()));
    }
    tracing::info!(zone_id = %zone_id, "Zone deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}
