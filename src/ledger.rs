//! Idempotency ledger: which completion signals have already been processed.
//!
//! Keys are `<gateway>_<event>_<external_ref>`, so a webhook retry and a
//! status poll reporting the same event for the same payment share a key.
//! Recording is insert-if-absent: the first writer wins and a record is
//! never overwritten.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCheck {
    New,
    Recorded { payment_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Another writer got there first; its record stands.
    AlreadyRecorded,
}

/// Storage for processed-signal records.
///
/// Methods take the caller's connection so a record can commit in the same
/// transaction as the payment transition it describes.
pub trait IdempotencyLedger: Send + Sync {
    fn check(&self, conn: &Connection, key: &str) -> Result<LedgerCheck>;

    fn record(&self, conn: &Connection, key: &str, payment_id: &str) -> Result<RecordOutcome>;
}

/// Ledger backed by the `payment_idempotency` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteLedger;

impl IdempotencyLedger for SqliteLedger {
    fn check(&self, conn: &Connection, key: &str) -> Result<LedgerCheck> {
        Ok(match queries::get_idempotency_record(conn, key)? {
            Some(record) => LedgerCheck::Recorded {
                payment_id: record.payment_id,
            },
            None => LedgerCheck::New,
        })
    }

    fn record(&self, conn: &Connection, key: &str, payment_id: &str) -> Result<RecordOutcome> {
        if queries::try_record_idempotency(conn, key, payment_id)? {
            Ok(RecordOutcome::Recorded)
        } else {
            Ok(RecordOutcome::AlreadyRecorded)
        }
    }
}

pub fn idempotency_key(gateway: &str, event: &str, external_ref: &str) -> String {
    format!("{}_{}_{}", gateway, event, external_ref)
}
