use serde::{Deserialize, Serialize};

use super::deserialize_optional_nullable;
use crate::error::{AppError, Result, msg};

/// A Wi-Fi access point / location with its own ticket inventory and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Hotspot router address shown to customers with their ticket
    pub router_ip: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateZone {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub router_ip: Option<String>,
}

/// Partial update; `null` clears an optional field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateZone {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub router_ip: Option<Option<String>>,
}

impl UpdateZone {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name
            && name.trim().is_empty()
        {
            return Err(AppError::BadRequest(msg::NAME_REQUIRED.into()));
        }
        Ok(())
    }
}

/// Zone fields safe to show on the captive portal.
#[derive(Debug, Clone, Serialize)]
pub struct PublicZone {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl From<Zone> for PublicZone {
    fn from(zone: Zone) -> Self {
        Self {
            id: zone.id,
            name: zone.name,
            location: zone.location,
            description: zone.description,
        }
    }
}
