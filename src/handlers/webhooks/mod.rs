pub mod moneroo;

pub use moneroo::handle_moneroo_webhook;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/payments/moneroo/webhook", post(handle_moneroo_webhook))
}
