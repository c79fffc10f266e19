mod payments;
mod pricings;
mod tickets;
mod zones;

pub use payments::*;
pub use pricings::*;
pub use tickets::*;
pub use zones::*;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

/// Operator API under `/admin`, bearer `ADMIN_API_KEY`.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/zones", post(create_zone).get(list_zones))
        .route(
            "/admin/zones/{zone_id}",
            get(get_zone).patch(update_zone).delete(delete_zone),
        )
        .route(
            "/admin/zones/{zone_id}/pricings",
            post(create_pricing).get(list_pricings),
        )
        .route(
            "/admin/zones/{zone_id}/tickets",
            get(list_tickets).delete(delete_free_tickets),
        )
        .route("/admin/zones/{zone_id}/tickets/import", post(import_tickets))
        .route("/admin/zones/{zone_id}/tickets/stats", get(ticket_stats))
        .route(
            "/admin/zones/{zone_id}/tickets/{ticket_id}",
            delete(delete_ticket),
        )
        .route(
            "/admin/pricings/{pricing_id}",
            patch(update_pricing).delete(delete_pricing),
        )
        .route("/admin/zones/{zone_id}/payments", get(list_zone_payments))
        .route("/admin/payments/reconciliation", get(list_reconciliation))
        .route("/admin/payments/{payment_id}/fulfill", post(fulfill_payment))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
