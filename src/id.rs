//! Prefixed ID generation for zoneticket entities.
//!
//! All IDs use a `zt_` brand prefix so they can never be confused with the
//! payment gateway's own references (Moneroo uses `py_...`).
//!
//! Format: `zt_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

const ALL_PREFIXES: &[&str] = &["zt_zone_", "zt_prc_", "zt_tkt_", "zt_pay_"];

/// Validate that a string is a valid zoneticket prefixed ID.
///
/// Validates format: `zt_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// True if `s` looks like an internal payment ID rather than a gateway reference.
pub fn is_payment_id(s: &str) -> bool {
    s.starts_with(EntityType::Payment.prefix()) && is_valid_prefixed_id(s)
}

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Zone,
    Pricing,
    Ticket,
    Payment,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Zone => "zt_zone",
            Self::Pricing => "zt_prc",
            Self::Ticket => "zt_tkt",
            Self::Payment => "zt_pay",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
