mod intent;
mod status;
mod zones;

pub use intent::*;
pub use status::*;
pub use zones::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/payments/intent", post(create_payment_intent))
        // Internal id (zt_pay_...) or gateway reference (py_...)
        .route("/payments/{reference}", get(get_payment_status))
        .route("/zones/{zone_id}/public", get(get_public_zone))
        .route("/zones/{zone_id}/pricings/public", get(list_public_pricings))
}
