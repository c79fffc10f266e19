//! Payment gateway abstraction.
//!
//! The confirmation pipeline talks to the aggregator only through
//! [`PaymentGateway`], so tests can substitute a scripted gateway.

mod moneroo;

pub use moneroo::*;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

use crate::models::Customer;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boxed future returned by gateway calls.
pub type GatewayFuture<T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send>>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway timed out")]
    Timeout,

    #[error("Payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Payment gateway unreachable: {0}")]
    Transport(String),

    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// A failure that may clear on its own: timeouts, network errors, gateway 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::NotConfigured | Self::InvalidResponse(_) => false,
        }
    }
}

/// Hosted checkout request for one payment.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    /// Whole currency units
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub return_url: String,
    pub customer: Customer,
    pub metadata: serde_json::Value,
    /// Allowed payment methods, e.g. `mtn_bj`. Empty means gateway default.
    pub methods: Vec<String>,
}

/// A checkout the customer can be redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Gateway reference for the payment (`py_...`)
    pub external_ref: String,
    pub checkout_url: String,
}

/// The gateway's view of a payment, as returned by verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPayment {
    pub external_ref: String,
    /// Raw gateway status (`success`, `failed`, `cancelled`, `pending`, `initiated`)
    pub status: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
}

impl GatewayPayment {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "cancelled")
    }
}

/// A payment aggregator.
pub trait PaymentGateway: Send + Sync {
    /// Short stable name, used as the idempotency key prefix.
    fn name(&self) -> &'static str;

    /// Create a hosted checkout.
    fn create_checkout(&self, request: CheckoutRequest) -> GatewayFuture<Checkout>;

    /// Ask the gateway for the authoritative status of a payment.
    fn verify_payment(&self, external_ref: &str) -> GatewayFuture<GatewayPayment>;
}
