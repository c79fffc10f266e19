use serde::{Deserialize, Serialize};

use super::deserialize_optional_nullable;
use crate::error::{AppError, Result, msg};

/// A named (amount, duration) offer a customer picks before paying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub id: String,
    pub zone_id: String,
    pub name: String,
    /// Whole currency units (XOF has no minor unit)
    pub amount: i64,
    pub duration_hours: i64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePricing {
    pub name: String,
    pub amount: i64,
    pub duration_hours: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update. Setting `is_active: false` retires a tier without
/// touching the payments that used it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePricing {
    pub name: Option<String>,
    pub amount: Option<i64>,
    pub duration_hours: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl UpdatePricing {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name
            && name.trim().is_empty()
        {
            return Err(AppError::BadRequest(msg::NAME_REQUIRED.into()));
        }
        if self.amount.is_some_and(|a| a <= 0) {
            return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
        }
        if self.duration_hours.is_some_and(|d| d <= 0) {
            return Err(AppError::BadRequest(msg::INVALID_DURATION.into()));
        }
        Ok(())
    }
}
