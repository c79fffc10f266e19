use axum::extract::State;
use serde::Serialize;

use crate::confirmation::PaymentSnapshot;
use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::models::{Payment, PaymentFilters, Ticket};
use crate::pagination::{PageQuery, Paginated};

#[derive(Debug, Serialize)]
pub struct FulfillResponse {
    pub payment: Payment,
    pub tickets: Vec<Ticket>,
}

impl From<PaymentSnapshot> for FulfillResponse {
    fn from(snapshot: PaymentSnapshot) -> Self {
        Self {
            payment: snapshot.payment,
            tickets: snapshot.tickets,
        }
    }
}

pub async fn list_zone_payments(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(filters): Query<PaymentFilters>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Paginated<Payment>>> {
    let conn = state.db.get()?;
    queries::get_zone_by_id(&conn, &zone_id)?.or_not_found(msg::ZONE_NOT_FOUND)?;
    let (payments, total) = queries::list_payments_for_zone_paginated(
        &conn,
        &zone_id,
        &filters,
        page.limit(),
        page.offset(),
    )?;
    Ok(Json(Paginated::new(payments, total, &page)))
}

/// Paid payments still waiting for a ticket.
pub async fn list_reconciliation(State(state): State<AppState>) -> Result<Json<Vec<Payment>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_payments_needing_reconciliation(&conn)?))
}

/// Retry ticket assignment for a payment flagged after inventory ran out.
/// 409 if the payment isn't flagged or the zone still has no free ticket.
pub async fn fulfill_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<FulfillResponse>> {
    let snapshot = state.confirmation.fulfill_payment(&payment_id).await?;
    Ok(Json(snapshot.into()))
}
