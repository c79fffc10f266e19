use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::TicketCredentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// Completed and failed are final; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Pending => false,
            Self::Completed | Self::Failed => true,
        }
    }
}

/// A purchase attempt and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    /// Gateway reference (`py_...`), set once the checkout has been created
    pub external_ref: Option<String>,
    pub zone_id: String,
    pub pricing_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub phone: Option<String>,
    pub status: PaymentStatus,
    /// Mobile-money operator transaction id reported by the gateway
    pub transaction_id: Option<String>,
    /// Paid but no ticket could be assigned; an operator must fulfill it
    pub needs_reconciliation: bool,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub failed_at: Option<i64>,
    /// Last time the gateway was asked about this payment
    pub last_polled_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub zone_id: String,
    pub pricing_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub phone: Option<String>,
}

/// Customer contact details collected on the captive portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// What the customer sees while waiting for their ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerState {
    TicketReady,
    Processing,
    Failed,
}

impl CustomerState {
    pub fn of(payment: &Payment, has_ticket: bool) -> Self {
        match payment.status {
            PaymentStatus::Completed if has_ticket => Self::TicketReady,
            // Paid, ticket not bound yet (or inventory ran out and an operator is on it)
            PaymentStatus::Completed | PaymentStatus::Pending => Self::Processing,
            PaymentStatus::Failed => Self::Failed,
        }
    }
}

/// Payment as returned to the captive portal, with zone/pricing context.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub id: String,
    pub status: PaymentStatus,
    pub state: CustomerState,
    pub amount: i64,
    pub currency: String,
    pub zone_name: Option<String>,
    pub router_ip: Option<String>,
    pub pricing_name: Option<String>,
    pub duration_hours: Option<i64>,
    pub tickets: Vec<TicketCredentials>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PaymentFilters {
    #[serde(default)]
    pub status: Option<PaymentStatus>,
}
