use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;

use crate::confirmation::{ConfirmationError, SignalOutcome};
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{PaymentStatus, TicketCredentials};
use crate::util::extract_signature;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub message: &'static str,
    pub payment_id: String,
    pub status: PaymentStatus,
    pub needs_reconciliation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketCredentials>,
}

impl From<SignalOutcome> for WebhookAck {
    fn from(outcome: SignalOutcome) -> Self {
        let message = match &outcome {
            SignalOutcome::Fulfilled { .. } => "Payment processed successfully",
            SignalOutcome::InventoryExhausted { .. } => {
                "Payment confirmed but no ticket is available; flagged for reconciliation"
            }
            SignalOutcome::PaymentFailed { .. } => "Payment marked as failed",
            SignalOutcome::Acknowledged { .. } => "Webhook received",
            SignalOutcome::AlreadyProcessed { .. } => "Webhook already processed",
        };
        let ticket = outcome.ticket().map(|t| t.credentials());
        let payment = outcome.payment();
        Self {
            message,
            payment_id: payment.id.clone(),
            status: payment.status,
            needs_reconciliation: payment.needs_reconciliation,
            ticket,
        }
    }
}

/// Moneroo completion webhook.
///
/// Every processed outcome is acknowledged with 200, duplicates and
/// inventory exhaustion included, so the gateway stops retrying. Only
/// authentication, parse and unknown-payment failures are rejected; storage
/// failures return 500 and rely on redelivery.
pub async fn handle_moneroo_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = extract_signature(&headers);

    match state
        .confirmation
        .handle_completion_signal(&body, signature)
        .await
    {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => {
            match &e {
                ConfirmationError::MissingSignature | ConfirmationError::InvalidSignature => {
                    tracing::warn!("Rejected Moneroo webhook: {}", e);
                }
                ConfirmationError::Malformed(_) | ConfirmationError::PaymentNotFound => {
                    tracing::warn!("Unprocessable Moneroo webhook: {}", e);
                }
                _ => tracing::error!("Moneroo webhook processing failed: {}", e),
            }
            Err(e.into())
        }
    }
}
