//! Row mapping for the zoneticket tables.
//!
//! Models implement `FromRow`; `query_one` / `query_all` run a statement and
//! map every row through it. Column lists live here so SELECT and RETURNING
//! clauses stay in the same order as the `from_row` indices.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a text column into an enum, surfacing bad values as a column type error
/// instead of panicking.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
///
/// Also used for `UPDATE ... RETURNING`: SQLite applies the whole update on the
/// first step, so reading one row is enough.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ZONE_COLS: &str = "id, name, location, description, router_ip, created_at, updated_at";

pub const PRICING_COLS: &str =
    "id, zone_id, name, amount, duration_hours, description, is_active, created_at, updated_at";

pub const TICKET_COLS: &str =
    "id, zone_id, username, password, profile, status, payment_id, sold_at, created_at";

pub const PAYMENT_COLS: &str = "id, external_ref, zone_id, pricing_id, amount, currency, phone, status, transaction_id, needs_reconciliation, created_at, completed_at, failed_at, last_polled_at";

pub const IDEMPOTENCY_COLS: &str = "idempotency_key, payment_id, created_at";

// ============ FromRow Implementations ============

impl FromRow for Zone {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Zone {
            id: row.get(0)?,
            name: row.get(1)?,
            location: row.get(2)?,
            description: row.get(3)?,
            router_ip: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Pricing {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Pricing {
            id: row.get(0)?,
            zone_id: row.get(1)?,
            name: row.get(2)?,
            amount: row.get(3)?,
            duration_hours: row.get(4)?,
            description: row.get(5)?,
            is_active: row.get::<_, i32>(6)? != 0,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Ticket {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Ticket {
            id: row.get(0)?,
            zone_id: row.get(1)?,
            username: row.get(2)?,
            password: row.get(3)?,
            profile: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            payment_id: row.get(6)?,
            sold_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            external_ref: row.get(1)?,
            zone_id: row.get(2)?,
            pricing_id: row.get(3)?,
            amount: row.get(4)?,
            currency: row.get(5)?,
            phone: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            transaction_id: row.get(8)?,
            needs_reconciliation: row.get::<_, i32>(9)? != 0,
            created_at: row.get(10)?,
            completed_at: row.get(11)?,
            failed_at: row.get(12)?,
            last_polled_at: row.get(13)?,
        })
    }
}

impl FromRow for IdempotencyRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(IdempotencyRecord {
            key: row.get(0)?,
            payment_id: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}
