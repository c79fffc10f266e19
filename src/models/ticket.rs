use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TicketStatus {
    Free,
    /// Held for a sale that has not completed. The confirmation flow never sets it.
    Reserved,
    Sold,
    Expired,
}

/// A single-use network access credential pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub zone_id: String,
    pub username: String,
    pub password: String,
    /// Hotspot profile tag (e.g. "1h", "24h")
    pub profile: Option<String>,
    pub status: TicketStatus,
    /// Payment this ticket was sold to (set once, on the free -> sold claim)
    pub payment_id: Option<String>,
    pub sold_at: Option<i64>,
    pub created_at: i64,
}

impl Ticket {
    pub fn credentials(&self) -> TicketCredentials {
        TicketCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// What a paying customer receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCredentials {
    pub username: String,
    pub password: String,
}

/// One row of an inventory import.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportTicket {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub total: i64,
    pub free: i64,
    pub reserved: i64,
    pub sold: i64,
    pub expired: i64,
}
