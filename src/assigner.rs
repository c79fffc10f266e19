//! Ticket assignment: bind one free ticket of a zone to a paid payment.

use rusqlite::Connection;
use thiserror::Error;

use crate::db::queries;
use crate::error::AppError;
use crate::models::Ticket;

#[derive(Debug, Error)]
pub enum AssignError {
    /// The zone has no free ticket. Retrying will not help.
    #[error("no free ticket available in zone")]
    NoTicketAvailable,

    #[error("ticket storage error: {0}")]
    Storage(#[from] AppError),
}

impl From<rusqlite::Error> for AssignError {
    fn from(e: rusqlite::Error) -> Self {
        AssignError::Storage(e.into())
    }
}

/// Claims tickets for paid payments.
///
/// An implementation must never hand the same ticket to two payments, even
/// when called concurrently for different payments in the same zone.
pub trait TicketAssigner: Send + Sync {
    fn assign(&self, conn: &Connection, zone_id: &str, payment_id: &str) -> Result<Ticket, AssignError>;
}

/// Assigner using the single-statement claim on the `tickets` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteTicketAssigner;

impl TicketAssigner for SqliteTicketAssigner {
    fn assign(&self, conn: &Connection, zone_id: &str, payment_id: &str) -> Result<Ticket, AssignError> {
        queries::claim_free_ticket(conn, zone_id, payment_id)?.ok_or(AssignError::NoTicketAvailable)
    }
}

/// Assign, retrying once on a storage error. Exhaustion is returned as is.
pub fn assign_with_retry(
    assigner: &dyn TicketAssigner,
    conn: &Connection,
    zone_id: &str,
    payment_id: &str,
) -> Result<Ticket, AssignError> {
    match assigner.assign(conn, zone_id, payment_id) {
        Err(AssignError::Storage(e)) => {
            tracing::warn!(payment_id = %payment_id, error = %e, "Ticket assignment failed, retrying once");
            assigner.assign(conn, zone_id, payment_id)
        }
        other => other,
    }
}
