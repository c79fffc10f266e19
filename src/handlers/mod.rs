pub mod admin;
pub mod public;
pub mod webhooks;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::AppState;

/// The full HTTP application.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(webhooks::router())
        .merge(admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
