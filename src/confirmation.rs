//! Payment confirmation: turns gateway completion signals (webhooks and status
//! polls) into payment transitions and ticket assignments.
//!
//! A payment moves `pending -> completed` or `pending -> failed` exactly once.
//! Everything one signal changes (the transition, the ticket claim, the
//! reconciliation flag and the ledger record) commits in a single
//! `BEGIN IMMEDIATE` transaction. The status compare-and-swap inside that
//! transaction decides the winner when signals race; the ledger lets repeats
//! return early without taking the write lock.

use std::sync::Arc;

use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;

use crate::assigner::{AssignError, SqliteTicketAssigner, TicketAssigner, assign_with_retry};
use crate::crypto::verify_hmac_sha256_hex;
use crate::db::{DbPool, queries};
use crate::error::{AppError, msg};
use crate::ledger::{IdempotencyLedger, LedgerCheck, RecordOutcome, SqliteLedger, idempotency_key};
use crate::models::{Payment, PaymentStatus, Ticket};
use crate::payments::{GatewayError, MonerooWebhookEvent, PaymentGateway};

pub const EVENT_PAYMENT_SUCCESS: &str = "payment.success";
pub const EVENT_PAYMENT_FAILED: &str = "payment.failed";
pub const EVENT_PAYMENT_CANCELLED: &str = "payment.cancelled";

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("missing signature")]
    MissingSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed completion signal: {0}")]
    Malformed(String),

    #[error("payment not found")]
    PaymentNotFound,

    #[error("payment is not awaiting ticket fulfillment")]
    NotAwaitingFulfillment,

    #[error("no free ticket available")]
    InventoryExhausted,

    #[error(transparent)]
    Storage(#[from] AppError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<rusqlite::Error> for ConfirmationError {
    fn from(e: rusqlite::Error) -> Self {
        ConfirmationError::Storage(e.into())
    }
}

impl From<r2d2::Error> for ConfirmationError {
    fn from(e: r2d2::Error) -> Self {
        ConfirmationError::Storage(e.into())
    }
}

impl From<tokio::task::JoinError> for ConfirmationError {
    fn from(e: tokio::task::JoinError) -> Self {
        ConfirmationError::Storage(e.into())
    }
}

impl From<ConfirmationError> for AppError {
    fn from(e: ConfirmationError) -> Self {
        match e {
            ConfirmationError::MissingSignature | ConfirmationError::InvalidSignature => {
                AppError::Unauthorized
            }
            ConfirmationError::Malformed(m) => AppError::BadRequest(m),
            ConfirmationError::PaymentNotFound => AppError::NotFound(msg::PAYMENT_NOT_FOUND.into()),
            ConfirmationError::NotAwaitingFulfillment => {
                AppError::Conflict(msg::NOT_AWAITING_FULFILLMENT.into())
            }
            ConfirmationError::InventoryExhausted => {
                AppError::Conflict(msg::NO_TICKET_AVAILABLE.into())
            }
            ConfirmationError::Storage(e) => e,
            ConfirmationError::Gateway(e) => AppError::BadGateway(e.to_string()),
        }
    }
}

type Result<T> = std::result::Result<T, ConfirmationError>;

/// A normalized completion signal, from a webhook or a verified poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSignal {
    pub event: String,
    pub external_ref: String,
    /// `data.status` as reported by the gateway
    pub status: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Success,
    Failure,
    /// Informational event; recorded, no state change
    Other,
}

impl CompletionSignal {
    /// Parse a Moneroo webhook body.
    pub fn from_moneroo(body: &[u8]) -> Result<Self> {
        let event: MonerooWebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ConfirmationError::Malformed(format!("Invalid webhook payload: {}", e)))?;
        if event.event.trim().is_empty() || event.data.id.trim().is_empty() {
            return Err(ConfirmationError::Malformed(
                "Webhook payload is missing event or payment id".into(),
            ));
        }
        let transaction_id = event.data.transaction_id();
        Ok(Self {
            event: event.event,
            external_ref: event.data.id,
            status: event.data.status,
            transaction_id,
        })
    }

    pub fn kind(&self) -> SignalKind {
        match self.event.as_str() {
            EVENT_PAYMENT_SUCCESS if self.status.as_deref() == Some("success") => SignalKind::Success,
            EVENT_PAYMENT_FAILED | EVENT_PAYMENT_CANCELLED => SignalKind::Failure,
            _ => SignalKind::Other,
        }
    }
}

/// What processing a signal did.
#[derive(Debug, Clone)]
pub enum SignalOutcome {
    /// Payment completed and a ticket was bound to it.
    Fulfilled { payment: Payment, ticket: Ticket },
    /// Payment completed but the zone had no free ticket. Flagged for reconciliation.
    InventoryExhausted { payment: Payment },
    PaymentFailed { payment: Payment },
    /// Informational event recorded without a state change.
    Acknowledged { payment: Payment },
    /// Signal already processed or payment already terminal. Nothing changed.
    AlreadyProcessed { payment: Payment, tickets: Vec<Ticket> },
}

impl SignalOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Fulfilled { payment, .. }
            | Self::InventoryExhausted { payment }
            | Self::PaymentFailed { payment }
            | Self::Acknowledged { payment }
            | Self::AlreadyProcessed { payment, .. } => payment,
        }
    }

    /// The ticket bound to the payment, if any.
    pub fn ticket(&self) -> Option<&Ticket> {
        match self {
            Self::Fulfilled { ticket, .. } => Some(ticket),
            Self::AlreadyProcessed { tickets, .. } => tickets.first(),
            Self::InventoryExhausted { .. } | Self::PaymentFailed { .. } | Self::Acknowledged { .. } => {
                None
            }
        }
    }
}

/// A payment and the tickets bound to it.
#[derive(Debug, Clone)]
pub struct PaymentSnapshot {
    pub payment: Payment,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    /// Payments that left `pending` during this sweep
    pub resolved: usize,
    pub errors: usize,
}

#[derive(Clone)]
pub struct ConfirmationService {
    pool: DbPool,
    ledger: Arc<dyn IdempotencyLedger>,
    assigner: Arc<dyn TicketAssigner>,
    gateway: Arc<dyn PaymentGateway>,
    webhook_secret: Arc<[u8]>,
}

impl ConfirmationService {
    pub fn new(
        pool: DbPool,
        ledger: Arc<dyn IdempotencyLedger>,
        assigner: Arc<dyn TicketAssigner>,
        gateway: Arc<dyn PaymentGateway>,
        webhook_secret: &str,
    ) -> Self {
        Self {
            pool,
            ledger,
            assigner,
            gateway,
            webhook_secret: Arc::from(webhook_secret.as_bytes()),
        }
    }

    /// Service backed by the SQLite ledger and assigner.
    pub fn with_sqlite(pool: DbPool, gateway: Arc<dyn PaymentGateway>, webhook_secret: &str) -> Self {
        Self::new(
            pool,
            Arc::new(SqliteLedger),
            Arc::new(SqliteTicketAssigner),
            gateway,
            webhook_secret,
        )
    }

    pub fn verify_signature(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfirmationError::MissingSignature)?;
        if verify_hmac_sha256_hex(&self.webhook_secret, body, signature) {
            Ok(())
        } else {
            Err(ConfirmationError::InvalidSignature)
        }
    }

    /// Entry point for gateway webhooks: authenticate the raw body, parse it
    /// and process it. Nothing is read or written before the signature checks out.
    pub async fn handle_completion_signal(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<SignalOutcome> {
        self.verify_signature(body, signature)?;
        let signal = CompletionSignal::from_moneroo(body)?;
        tracing::info!(
            event = %signal.event,
            external_ref = %signal.external_ref,
            status = ?signal.status,
            "Completion signal received"
        );
        self.process_signal(signal).await
    }

    /// Apply an authenticated signal.
    pub async fn process_signal(&self, signal: CompletionSignal) -> Result<SignalOutcome> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.process_signal_blocking(&signal)).await?
    }

    /// Re-check a pending payment with the gateway and apply what it reports.
    ///
    /// Terminal payments, and pending ones the gateway has not issued a
    /// reference for yet, are returned without a gateway call. Every gateway
    /// call stamps `last_polled_at`, even a failed one. A gateway error is
    /// returned to the caller with the payment left pending.
    pub async fn poll_status(&self, reference: &str) -> Result<PaymentSnapshot> {
        let snapshot = self.snapshot(reference).await?;
        let external_ref = match (&snapshot.payment.status, &snapshot.payment.external_ref) {
            (PaymentStatus::Pending, Some(external_ref)) => external_ref.clone(),
            _ => return Ok(snapshot),
        };

        self.mark_polled(&snapshot.payment.id).await?;
        let verified = self.gateway.verify_payment(&external_ref).await.map_err(|e| {
            tracing::warn!(
                payment_id = %snapshot.payment.id,
                external_ref = %external_ref,
                error = %e,
                "Gateway verification failed, payment stays pending"
            );
            e
        })?;

        let event = if verified.is_success() {
            EVENT_PAYMENT_SUCCESS
        } else if verified.is_failure() {
            if verified.status == "cancelled" {
                EVENT_PAYMENT_CANCELLED
            } else {
                EVENT_PAYMENT_FAILED
            }
        } else {
            tracing::debug!(
                payment_id = %snapshot.payment.id,
                gateway_status = %verified.status,
                "Payment still pending at gateway"
            );
            return Ok(snapshot);
        };

        tracing::info!(
            payment_id = %snapshot.payment.id,
            gateway_status = %verified.status,
            "Gateway reports final status, applying"
        );
        let signal = CompletionSignal {
            event: event.to_string(),
            external_ref,
            status: Some(verified.status),
            transaction_id: verified.transaction_id,
        };
        let outcome = self.process_signal(signal).await?;
        self.snapshot(&outcome.payment().id).await
    }

    /// Operator action: assign a ticket to a paid payment that was flagged
    /// for reconciliation after inventory ran out.
    pub async fn fulfill_payment(&self, payment_id: &str) -> Result<PaymentSnapshot> {
        let this = self.clone();
        let payment_id = payment_id.to_string();
        tokio::task::spawn_blocking(move || this.fulfill_payment_blocking(&payment_id)).await?
    }

    /// Poll up to `limit` pending payments older than `min_age_secs`, least
    /// recently polled first.
    pub async fn sweep_pending(&self, min_age_secs: i64, limit: i64) -> Result<SweepReport> {
        let pool = self.pool.clone();
        let cutoff = queries::now() - min_age_secs;
        let stale = tokio::task::spawn_blocking(move || -> Result<Vec<Payment>> {
            let conn = pool.get()?;
            Ok(queries::list_stale_pending_payments(&conn, cutoff, limit)?)
        })
        .await??;

        let mut report = SweepReport::default();
        for payment in stale {
            report.checked += 1;
            match self.poll_status(&payment.id).await {
                Ok(snapshot) if snapshot.payment.status.is_terminal() => report.resolved += 1,
                Ok(_) => {}
                Err(ConfirmationError::Gateway(e)) if e.is_transient() => {
                    report.errors += 1;
                    tracing::warn!(payment_id = %payment.id, error = %e, "Pending sweep: gateway unavailable, will retry");
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(payment_id = %payment.id, error = %e, "Pending sweep: poll failed");
                }
            }
        }
        Ok(report)
    }

    /// Current state of a payment by internal id or gateway reference, without polling.
    pub async fn snapshot(&self, reference: &str) -> Result<PaymentSnapshot> {
        let pool = self.pool.clone();
        let reference = reference.to_string();
        tokio::task::spawn_blocking(move || -> Result<PaymentSnapshot> {
            let conn = pool.get()?;
            let payment = queries::get_payment_by_reference(&conn, &reference)?
                .ok_or(ConfirmationError::PaymentNotFound)?;
            let tickets = queries::get_tickets_for_payment(&conn, &payment.id)?;
            Ok(PaymentSnapshot { payment, tickets })
        })
        .await?
    }

    async fn mark_polled(&self, payment_id: &str) -> Result<()> {
        let pool = self.pool.clone();
        let payment_id = payment_id.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get()?;
            Ok(queries::mark_payment_polled(&conn, &payment_id, queries::now())?)
        })
        .await?
    }

    fn process_signal_blocking(&self, signal: &CompletionSignal) -> Result<SignalOutcome> {
        let key = idempotency_key(self.gateway.name(), &signal.event, &signal.external_ref);
        let mut conn = self.pool.get()?;

        if let LedgerCheck::Recorded { payment_id } = self.ledger.check(&conn, &key)? {
            tracing::warn!(key = %key, payment_id = %payment_id, "Duplicate completion signal ignored");
            return self.already_processed(&conn, &payment_id);
        }

        let payment = queries::get_payment_by_external_ref(&conn, &signal.external_ref)?
            .ok_or_else(|| {
                tracing::warn!(external_ref = %signal.external_ref, "Completion signal for unknown payment");
                ConfirmationError::PaymentNotFound
            })?;

        if payment.status.is_terminal() {
            self.record(&conn, &key, &payment.id)?;
            tracing::info!(
                payment_id = %payment.id,
                status = %payment.status.as_ref(),
                event = %signal.event,
                "Payment already terminal, signal acknowledged"
            );
            return self.already_processed(&conn, &payment.id);
        }

        match signal.kind() {
            SignalKind::Success => self.complete_and_assign(&mut conn, &key, &payment, signal),
            SignalKind::Failure => self.fail(&mut conn, &key, &payment),
            // An unconfirmed success shares its key with the confirmed delivery
            // that follows, so only other events are recorded.
            SignalKind::Other if signal.event == EVENT_PAYMENT_SUCCESS => {
                tracing::info!(
                    payment_id = %payment.id,
                    status = ?signal.status,
                    "Success event without confirmed status, not recorded"
                );
                Ok(SignalOutcome::Acknowledged { payment })
            }
            SignalKind::Other => {
                self.record(&conn, &key, &payment.id)?;
                tracing::info!(payment_id = %payment.id, event = %signal.event, "Informational event recorded");
                Ok(SignalOutcome::Acknowledged { payment })
            }
        }
    }

    fn complete_and_assign(
        &self,
        conn: &mut Connection,
        key: &str,
        payment: &Payment,
        signal: &CompletionSignal,
    ) -> Result<SignalOutcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !queries::try_complete_payment(&tx, &payment.id, signal.transaction_id.as_deref())? {
            // Another signal finished this payment while we waited for the write lock
            self.record(&tx, key, &payment.id)?;
            tx.commit()?;
            return self.already_processed(conn, &payment.id);
        }

        let ticket = match assign_with_retry(self.assigner.as_ref(), &tx, &payment.zone_id, &payment.id) {
            Ok(ticket) => Some(ticket),
            Err(AssignError::NoTicketAvailable) => {
                queries::set_payment_reconciliation(&tx, &payment.id, true)?;
                None
            }
            // Dropping the transaction rolls the completion back; the payment
            // stays pending for the next delivery or poll.
            Err(AssignError::Storage(e)) => {
                tracing::error!(payment_id = %payment.id, error = %e, "Ticket assignment failed");
                return Err(e.into());
            }
        };

        self.record(&tx, key, &payment.id)?;
        tx.commit()?;

        let payment = queries::get_payment_by_id(conn, &payment.id)?
            .ok_or(ConfirmationError::PaymentNotFound)?;

        match ticket {
            Some(ticket) => {
                tracing::info!(
                    payment_id = %payment.id,
                    zone_id = %payment.zone_id,
                    ticket_id = %ticket.id,
                    "Payment completed, ticket assigned"
                );
                Ok(SignalOutcome::Fulfilled { payment, ticket })
            }
            None => {
                tracing::error!(
                    payment_id = %payment.id,
                    zone_id = %payment.zone_id,
                    "Payment completed but no ticket available, flagged for reconciliation"
                );
                Ok(SignalOutcome::InventoryExhausted { payment })
            }
        }
    }

    fn fail(&self, conn: &mut Connection, key: &str, payment: &Payment) -> Result<SignalOutcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let transitioned = queries::try_fail_payment(&tx, &payment.id)?;
        self.record(&tx, key, &payment.id)?;
        tx.commit()?;

        if !transitioned {
            return self.already_processed(conn, &payment.id);
        }

        let payment = queries::get_payment_by_id(conn, &payment.id)?
            .ok_or(ConfirmationError::PaymentNotFound)?;
        tracing::info!(payment_id = %payment.id, "Payment failed");
        Ok(SignalOutcome::PaymentFailed { payment })
    }

    fn fulfill_payment_blocking(&self, payment_id: &str) -> Result<PaymentSnapshot> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let payment = queries::get_payment_by_id(&tx, payment_id)?
            .ok_or(ConfirmationError::PaymentNotFound)?;
        if payment.status != PaymentStatus::Completed || !payment.needs_reconciliation {
            return Err(ConfirmationError::NotAwaitingFulfillment);
        }

        let existing = queries::get_tickets_for_payment(&tx, &payment.id)?;
        if existing.is_empty() {
            match assign_with_retry(self.assigner.as_ref(), &tx, &payment.zone_id, &payment.id) {
                Ok(ticket) => {
                    tracing::info!(payment_id = %payment.id, ticket_id = %ticket.id, "Flagged payment fulfilled");
                }
                Err(AssignError::NoTicketAvailable) => return Err(ConfirmationError::InventoryExhausted),
                Err(AssignError::Storage(e)) => return Err(e.into()),
            }
        }
        queries::set_payment_reconciliation(&tx, &payment.id, false)?;
        tx.commit()?;

        let payment = queries::get_payment_by_id(&conn, payment_id)?
            .ok_or(ConfirmationError::PaymentNotFound)?;
        let tickets = queries::get_tickets_for_payment(&conn, payment_id)?;
        Ok(PaymentSnapshot { payment, tickets })
    }

    fn record(&self, conn: &Connection, key: &str, payment_id: &str) -> Result<()> {
        if self.ledger.record(conn, key, payment_id)? == RecordOutcome::AlreadyRecorded {
            tracing::debug!(key = %key, "Idempotency key already recorded");
        }
        Ok(())
    }

    fn already_processed(&self, conn: &Connection, payment_id: &str) -> Result<SignalOutcome> {
        let payment = queries::get_payment_by_id(conn, payment_id)?
            .ok_or(ConfirmationError::PaymentNotFound)?;
        let tickets = queries::get_tickets_for_payment(conn, payment_id)?;
        Ok(SignalOutcome::AlreadyProcessed { payment, tickets })
    }
}
