use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{Pricing, PublicZone};

pub async fn get_public_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<PublicZone>> {
    let conn = state.db.get()?;
    let zone = queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    Ok(Json(zone.into()))
}

/// Active pricing tiers, cheapest first.
pub async fn list_public_pricings(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<Vec<Pricing>>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    Ok(Json(queries::list_pricings_for_zone(&conn, &zone_id, true)?))
}
