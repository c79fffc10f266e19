use axum::extract::State;

use crate::confirmation::{ConfirmationError, PaymentSnapshot};
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::models::{CustomerState, PaymentStatusView};

/// Payment status for the captive portal.
///
/// A pending payment is re-verified with the gateway first, so a customer
/// returning from checkout gets their ticket even if the webhook is late.
/// A gateway error just reports the payment as still processing.
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentStatusView>> {
    let snapshot = match state.confirmation.poll_status(&reference).await {
        Ok(snapshot) => snapshot,
        Err(ConfirmationError::Gateway(e)) => {
            tracing::debug!(reference = %reference, error = %e, "Status poll skipped gateway");
            state.confirmation.snapshot(&reference).await?
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(build_view(&state, snapshot)?))
}

fn build_view(state: &AppState, snapshot: PaymentSnapshot) -> Result<PaymentStatusView> {
    let PaymentSnapshot { payment, tickets } = snapshot;
    let conn = state.db.get()?;
    let zone = queries::get_zone_by_id(&conn, &payment.zone_id)?;
    let pricing = match payment.pricing_id.as_deref() {
        Some(id) => queries::get_pricing_by_id(&conn, id)?,
        None => None,
    };

    Ok(PaymentStatusView {
        state: CustomerState::of(&payment, !tickets.is_empty()),
        id: payment.id,
        status: payment.status,
        amount: payment.amount,
        currency: payment.currency,
        zone_name: zone.as_ref().map(|z| z.name.clone()),
        router_ip: zone.and_then(|z| z.router_ip),
        pricing_name: pricing.as_ref().map(|p| p.name.clone()),
        duration_hours: pricing.map(|p| p.duration_hours),
        tickets: tickets.iter().map(|t| t.credentials()).collect(),
        created_at: payment.created_at,
        completed_at: payment.completed_at,
    })
}
