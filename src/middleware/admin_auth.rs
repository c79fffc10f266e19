use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::crypto::{digest_eq, hash_secret};
use crate::db::AppState;
use crate::util::extract_bearer_token;

/// Require the operator API key as a bearer token.
///
/// With no `ADMIN_API_KEY` configured every admin request is refused.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state.admin_key_hash.as_deref().ok_or_else(|| {
        tracing::warn!("Admin request refused: ADMIN_API_KEY is not configured");
        StatusCode::UNAUTHORIZED
    })?;
    let token = extract_bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    if !digest_eq(&hash_secret(token), expected) {
        tracing::warn!("Admin request refused: invalid API key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
