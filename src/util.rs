//! Header helpers shared by handlers and middleware.

use axum::http::HeaderMap;

/// Header carrying the Moneroo webhook signature.
pub const MONEROO_SIGNATURE_HEADER: &str = "x-moneroo-signature";
/// Gateway-neutral alias, accepted when the Moneroo header is absent.
pub const GATEWAY_SIGNATURE_HEADER: &str = "x-gateway-signature";

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Webhook signature from the first signature header present.
pub fn extract_signature(headers: &HeaderMap) -> Option<&str> {
    [MONEROO_SIGNATURE_HEADER, GATEWAY_SIGNATURE_HEADER]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}
