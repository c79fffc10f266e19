//! Webhook completion signals: authentication, transitions, duplicates

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use rusqlite::Connection;
use zoneticket::assigner::{AssignError, SqliteTicketAssigner, TicketAssigner};
use zoneticket::error::AppError;
use zoneticket::ledger::SqliteLedger;

#[tokio::test]
async fn test_success_signal_completes_and_assigns() {
    let fx = Fixture::new(3);
    let payment = fx.pending_payment("py_happy");

    let outcome = fx.deliver("payment.success", "py_happy", "success").await.unwrap();

    let SignalOutcome::Fulfilled { payment: done, ticket } = outcome else {
        panic!("expected Fulfilled, got {:?}", outcome);
    };
    assert_eq!(done.id, payment.id);
    assert_eq!(done.status, PaymentStatus::Completed);
    assert_eq!(done.transaction_id.as_deref(), Some("TX-py_happy"));
    assert!(!done.needs_reconciliation);
    assert_eq!(ticket.status, TicketStatus::Sold);
    assert_eq!(ticket.payment_id.as_deref(), Some(payment.id.as_str()));

    let records = fx.ledger_records(&payment.id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, "moneroo_payment.success_py_happy");
    assert_eq!(fx.stats().sold, 1);
}

#[tokio::test]
async fn test_duplicate_signal_returns_same_ticket() {
    let fx = Fixture::new(3);
    let payment = fx.pending_payment("py_dup");

    let first = fx.deliver("payment.success", "py_dup", "success").await.unwrap();
    let second = fx.deliver("payment.success", "py_dup", "success").await.unwrap();

    assert!(matches!(first, SignalOutcome::Fulfilled { .. }));
    assert!(matches!(second, SignalOutcome::AlreadyProcessed { .. }));
    assert_eq!(
        first.ticket().map(|t| t.id.clone()),
        second.ticket().map(|t| t.id.clone())
    );
    assert_eq!(fx.tickets_for(&payment.id).len(), 1);
    assert_eq!(fx.stats().sold, 1);
    assert_eq!(fx.ledger_records(&payment.id).len(), 1);
}

#[tokio::test]
async fn test_invalid_signature_changes_nothing() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_forged");
    let body = webhook_body("payment.success", "py_forged", "success");
    let other = webhook_body("payment.success", "py_other", "success");

    let err = fx
        .service
        .handle_completion_signal(&body, Some(&sign(&other)))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfirmationError::InvalidSignature));

    let err = fx.service.handle_completion_signal(&body, None).await.unwrap_err();
    assert!(matches!(err, ConfirmationError::MissingSignature));

    assert_eq!(fx.payment(&payment.id).status, PaymentStatus::Pending);
    assert!(fx.ledger_records(&payment.id).is_empty());
    assert_eq!(fx.stats().free, 1);
}

#[tokio::test]
async fn test_unconfigured_secret_rejects_every_signal() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_nosecret");
    let service = ConfirmationService::with_sqlite(fx.db.pool.clone(), fx.gateway.clone(), "");
    let body = webhook_body("payment.success", "py_nosecret", "success");
    let signature = hmac_sha256_hex(b"", &body).unwrap();

    let err = service
        .handle_completion_signal(&body, Some(&signature))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfirmationError::InvalidSignature));
    assert_eq!(fx.payment(&payment.id).status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_malformed_body_is_rejected_after_signature() {
    let fx = Fixture::new(1);
    let body = br#"{"event":"payment.success"}"#.to_vec();

    let err = fx
        .service
        .handle_completion_signal(&body, Some(&sign(&body)))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfirmationError::Malformed(_)));
    assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_unknown_payment_is_not_found_and_not_recorded() {
    let fx = Fixture::new(1);

    let err = fx.deliver("payment.success", "py_ghost", "success").await.unwrap_err();
    assert!(matches!(err, ConfirmationError::PaymentNotFound));

    let key = idempotency_key("moneroo", "payment.success", "py_ghost");
    assert!(queries::get_idempotency_record(&fx.conn(), &key).unwrap().is_none());
    assert_eq!(fx.stats().free, 1);
}

#[tokio::test]
async fn test_failed_payment_ignores_later_success() {
    let fx = Fixture::new(2);
    let payment = fx.pending_payment("py_declined");

    let failed = fx.deliver("payment.failed", "py_declined", "failed").await.unwrap();
    assert!(matches!(failed, SignalOutcome::PaymentFailed { .. }));
    assert_eq!(fx.payment(&payment.id).status, PaymentStatus::Failed);

    let late = fx.deliver("payment.success", "py_declined", "success").await.unwrap();
    let SignalOutcome::AlreadyProcessed { payment: p, tickets } = late else {
        panic!("expected AlreadyProcessed, got {:?}", late);
    };
    assert_eq!(p.status, PaymentStatus::Failed);
    assert!(tickets.is_empty());
    assert_eq!(fx.stats().free, 2);
    // Both signals are on the ledger
    assert_eq!(fx.ledger_records(&payment.id).len(), 2);
}

#[tokio::test]
async fn test_cancellation_fails_payment() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_cancel");

    let outcome = fx.deliver("payment.cancelled", "py_cancel", "cancelled").await.unwrap();
    assert!(matches!(outcome, SignalOutcome::PaymentFailed { .. }));

    let payment = fx.payment(&payment.id);
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(payment.failed_at.is_some());
}

#[tokio::test]
async fn test_informational_event_is_recorded_without_transition() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_info");

    let outcome = fx.deliver("payment.initiated", "py_info", "initiated").await.unwrap();
    assert!(matches!(outcome, SignalOutcome::Acknowledged { .. }));
    assert_eq!(fx.payment(&payment.id).status, PaymentStatus::Pending);
    assert_eq!(fx.ledger_records(&payment.id).len(), 1);

    let done = fx.deliver("payment.success", "py_info", "success").await.unwrap();
    assert!(matches!(done, SignalOutcome::Fulfilled { .. }));
}

#[tokio::test]
async fn test_unconfirmed_success_does_not_block_confirmed_one() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_early");

    let early = fx.deliver("payment.success", "py_early", "pending").await.unwrap();
    assert!(matches!(early, SignalOutcome::Acknowledged { .. }));
    assert!(fx.ledger_records(&payment.id).is_empty());

    let confirmed = fx.deliver("payment.success", "py_early", "success").await.unwrap();
    assert!(matches!(confirmed, SignalOutcome::Fulfilled { .. }));
}

#[tokio::test]
async fn test_already_completed_payment_is_acknowledged() {
    let fx = Fixture::new(2);
    let payment = fx.pending_payment("py_done");
    fx.deliver("payment.success", "py_done", "success").await.unwrap();

    // A different event for a completed payment: recorded, nothing reassigned
    let outcome = fx.deliver("payment.failed", "py_done", "failed").await.unwrap();
    let SignalOutcome::AlreadyProcessed { payment: p, tickets } = outcome else {
        panic!("expected AlreadyProcessed, got {:?}", outcome);
    };
    assert_eq!(p.status, PaymentStatus::Completed);
    assert_eq!(tickets.len(), 1);
    assert_eq!(fx.stats().sold, 1);
    assert_eq!(fx.ledger_records(&payment.id).len(), 2);
}

// ============ Storage failures during assignment ============

/// Fails the first `failures` assignments, then delegates to the real assigner.
struct FailingAssigner {
    failures: usize,
    calls: AtomicUsize,
}

impl FailingAssigner {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self { failures, calls: AtomicUsize::new(0) })
    }
}

impl TicketAssigner for FailingAssigner {
    fn assign(&self, conn: &Connection, zone_id: &str, payment_id: &str) -> Result<Ticket, AssignError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(AssignError::Storage(AppError::Internal("database is locked".into())));
        }
        SqliteTicketAssigner.assign(conn, zone_id, payment_id)
    }
}

fn service_with(fx: &Fixture, assigner: Arc<FailingAssigner>) -> ConfirmationService {
    ConfirmationService::new(
        fx.db.pool.clone(),
        Arc::new(SqliteLedger),
        assigner,
        fx.gateway.clone(),
        TEST_WEBHOOK_SECRET,
    )
}

#[tokio::test]
async fn test_transient_assignment_failure_is_retried_once() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_retry");
    let assigner = FailingAssigner::new(1);
    let service = service_with(&fx, assigner.clone());

    let body = webhook_body("payment.success", "py_retry", "success");
    let outcome = service
        .handle_completion_signal(&body, Some(&sign(&body)))
        .await
        .unwrap();

    assert!(matches!(outcome, SignalOutcome::Fulfilled { .. }));
    assert_eq!(assigner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fx.tickets_for(&payment.id).len(), 1);
}

#[tokio::test]
async fn test_persistent_assignment_failure_leaves_payment_pending() {
    let fx = Fixture::new(1);
    let payment = fx.pending_payment("py_broken");
    let service = service_with(&fx, FailingAssigner::new(2));

    let body = webhook_body("payment.success", "py_broken", "success");
    let err = service
        .handle_completion_signal(&body, Some(&sign(&body)))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfirmationError::Storage(_)));

    // Rolled back: the gateway's next delivery must be able to finish the job
    let payment = fx.payment(&payment.id);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(fx.ledger_records(&payment.id).is_empty());
    assert_eq!(fx.stats().free, 1);

    let retried = fx.deliver("payment.success", "py_broken", "success").await.unwrap();
    assert!(matches!(retried, SignalOutcome::Fulfilled { .. }));
}
