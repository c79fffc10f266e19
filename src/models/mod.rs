mod idempotency;
mod payment;
mod pricing;
mod ticket;
mod zone;

pub use idempotency::*;
pub use payment::*;
pub use pricing::*;
pub use ticket::*;
pub use zone::*;

use serde::{Deserialize, Deserializer};

/// For PATCH bodies: an absent field stays `None`, an explicit `null`
/// becomes `Some(None)` (clear the column).
fn deserialize_optional_nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<T> = Option::deserialize(deserializer)?;
    Ok(Some(value))
}
