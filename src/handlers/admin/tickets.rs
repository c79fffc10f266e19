use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use crate::db::queries::{self, ImportResult};
use crate::db::AppState;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::{ImportTicket, Ticket, TicketStats, TicketStatus};
use crate::pagination::{PageQuery, Paginated};

#[derive(Debug, Deserialize)]
pub struct ImportTicketsRequest {
    pub tickets: Vec<ImportTicket>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketFilters {
    #[serde(default)]
    pub status: Option<TicketStatus>,
}

/// Load a batch of vouchers as free tickets. Rows with a blank username or
/// password are dropped; usernames already in the zone are skipped.
pub async fn import_tickets(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(request): Json<ImportTicketsRequest>,
) -> Result<(StatusCode, Json<ImportResult>)> {
    let rows: Vec<ImportTicket> = request
        .tickets
        .into_iter()
        .filter(|t| !t.username.trim().is_empty() && !t.password.trim().is_empty())
        .collect();
    if rows.is_empty() {
        return Err(AppError::BadRequest(msg::NO_TICKETS_IN_IMPORT.into()));
    }

    let mut conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let result = queries::import_tickets(&mut conn, &zone_id, &rows)?;
    tracing::info!(
        zone_id = %zone_id,
        imported = result.imported,
        skipped = result.skipped,
        "Tickets imported"
    );
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(filters): Query<TicketFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Ticket>>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let (tickets, total) = queries::list_tickets_for_zone_paginated(
        &conn,
        &zone_id,
        filters.status,
        page.limit(),
        page.offset(),
    )?;
    Ok(Json(Paginated::new(tickets, total, &page)))
}

pub async fn ticket_stats(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<TicketStats>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    Ok(Json(queries::get_ticket_stats(&conn, &zone_id)?))
}

#[derive(Debug, Deserialize)]
pub struct TicketPath {
    pub zone_id: String,
    pub ticket_id: String,
}

/// Delete a single unsold ticket. Sold and reserved tickets belong to a
/// payment and answer 409.
pub async fn delete_ticket(
    State(state): State<AppState>,
    Path(path): Path<TicketPath>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let ticket = queries::get_ticket_in_zone(&conn, &path.zone_id, &path.ticket_id)?
        .or_not_found(msg::TICKET_NOT_FOUND)?;
    if !queries::delete_free_ticket(&conn, &path.zone_id, &ticket.id)? {
        return Err(AppError::Conflict(msg::TICKET_NOT_FREE.into()));
    }
    tracing::info!(zone_id = %path.zone_id, ticket_id = %ticket.id, "Ticket deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Clear every free ticket of a zone, e.g. before importing a new voucher sheet.
pub async fn delete_free_tickets(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let deleted = queries::delete_free_tickets(&conn, &zone_id)?;
    tracing::info!(zone_id = %zone_id, deleted, "Free tickets deleted");
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
