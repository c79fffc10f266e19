use serde::Serialize;

/// A processed completion signal, keyed by `<gateway>_<event>_<external_ref>`.
#[derive(Debug, Clone, Serialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub payment_id: String,
    pub created_at: i64,
}
