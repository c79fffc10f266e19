use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, types::Value};

use crate::error::{AppError, Result};
use crate::id::{EntityType, is_payment_id};
use crate::models::*;

use super::from_row::{
    FromRow, IDEMPOTENCY_COLS, PAYMENT_COLS, PRICING_COLS, TICKET_COLS, ZONE_COLS, query_all,
    query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Dynamic `UPDATE ... RETURNING` for PATCH-style inputs. Bumps `updated_at`.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
        }
    }

    fn set_opt<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.fields.push((column, v.into()));
        }
        self
    }

    /// `Some(None)` writes NULL, `None` leaves the column alone.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(Some(v)) => self.fields.push((column, v.into())),
            Some(None) => self.fields.push((column, Value::Null)),
            None => {}
        }
        self
    }

    /// Returns `None` if no row matched or there was nothing to set.
    fn execute_returning<T: FromRow>(mut self, conn: &Connection, returning_cols: &str) -> Result<Option<T>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        self.fields.push(("updated_at", now().into()));
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

// ============ Zones ============

pub fn create_zone(conn: &Connection, input: &CreateZone) -> Result<Zone> {
    let id = EntityType::Zone.gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO zones (id, name, location, description, router_ip, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            &id,
            &input.name,
            &input.location,
            &input.description,
            &input.router_ip,
            now
        ],
    )?;
    Ok(Zone {
        id,
        name: input.name.clone(),
        location: input.location.clone(),
        description: input.description.clone(),
        router_ip: input.router_ip.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_zone_by_id(conn: &Connection, id: &str) -> Result<Option<Zone>> {
    query_one(
        conn,
        &format!("SELECT {} FROM zones WHERE id = ?1", ZONE_COLS),
        &[&id],
    )
}

pub fn list_zones(conn: &Connection) -> Result<Vec<Zone>> {
    query_all(
        conn,
        &format!("SELECT {} FROM zones ORDER BY created_at DESC", ZONE_COLS),
        &[],
    )
}

/// Returns the updated zone, or `None` if it does not exist or `input` is empty.
pub fn update_zone(conn: &Connection, id: &str, input: &UpdateZone) -> Result<Option<Zone>> {
    UpdateBuilder::new("zones", id)
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_nullable("location", input.location.clone())
        .set_nullable("description", input.description.clone())
        .set_nullable("router_ip", input.router_ip.clone())
        .execute_returning(conn, ZONE_COLS)
}

/// Delete a zone with its pricings and tickets. Refused (returns false) once
/// the zone has any payment, since payments are the sales record.
pub fn delete_zone(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM zones WHERE id = ?1
         AND NOT EXISTS (SELECT 1 FROM payments WHERE zone_id = ?1)",
        params![id],
    )?;
    Ok(deleted > 0)
}

// ============ Pricings ============

pub fn create_pricing(conn: &Connection, zone_id: &str, input: &CreatePricing) -> Result<Pricing> {
    let id = EntityType::Pricing.gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO pricings (id, zone_id, name, amount, duration_hours, description, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            &id,
            zone_id,
            &input.name,
            input.amount,
            input.duration_hours,
            &input.description,
            input.is_active as i32,
            now
        ],
    )?;
    Ok(Pricing {
        id,
        zone_id: zone_id.to_string(),
        name: input.name.clone(),
        amount: input.amount,
        duration_hours: input.duration_hours,
        description: input.description.clone(),
        is_active: input.is_active,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_pricing_by_id(conn: &Connection, id: &str) -> Result<Option<Pricing>> {
    query_one(
        conn,
        &format!("SELECT {} FROM pricings WHERE id = ?1", PRICING_COLS),
        &[&id],
    )
}

/// An active pricing that belongs to `zone_id`. Used to price a purchase.
pub fn get_active_pricing_for_zone(
    conn: &Connection,
    pricing_id: &str,
    zone_id: &str,
) -> Result<Option<Pricing>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM pricings WHERE id = ?1 AND zone_id = ?2 AND is_active = 1",
            PRICING_COLS
        ),
        &[&pricing_id, &zone_id],
    )
}

pub fn update_pricing(conn: &Connection, id: &str, input: &UpdatePricing) -> Result<Option<Pricing>> {
    UpdateBuilder::new("pricings", id)
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_opt("amount", input.amount)
        .set_opt("duration_hours", input.duration_hours)
        .set_nullable("description", input.description.clone())
        .set_opt("is_active", input.is_active.map(|a| a as i32))
        .execute_returning(conn, PRICING_COLS)
}

/// Payments that used the pricing keep their amount; their `pricing_id` is cleared.
pub fn delete_pricing(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM pricings WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

pub fn list_pricings_for_zone(
    conn: &Connection,
    zone_id: &str,
    active_only: bool,
) -> Result<Vec<Pricing>> {
    let filter = if active_only { " AND is_active = 1" } else { "" };
    query_all(
        conn,
        &format!(
            "SELECT {} FROM pricings WHERE zone_id = ?1{} ORDER BY amount ASC",
            PRICING_COLS, filter
        ),
        &[&zone_id],
    )
}

// ============ Tickets ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportResult {
    pub imported: usize,
    /// Rows whose username already exists in the zone
    pub skipped: usize,
}

/// Bulk-load free tickets into a zone. Duplicate usernames are skipped, not
/// overwritten, so re-importing a voucher sheet is harmless.
pub fn import_tickets(
    conn: &mut Connection,
    zone_id: &str,
    tickets: &[ImportTicket],
) -> Result<ImportResult> {
    let tx = conn.transaction()?;
    let now = now();
    let mut result = ImportResult::default();
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO tickets (id, zone_id, username, password, profile, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'free', ?6)",
        )?;
        for ticket in tickets {
            let inserted = stmt.execute(params![
                EntityType::Ticket.gen_id(),
                zone_id,
                ticket.username.trim(),
                ticket.password.trim(),
                &ticket.profile,
                now
            ])?;
            if inserted > 0 {
                result.imported += 1;
            } else {
                result.skipped += 1;
            }
        }
    }
    tx.commit()?;
    Ok(result)
}

/// Atomically move one free ticket of the zone to `sold` and bind it to the payment.
///
/// Selection and claim are a single statement: the outer `status = 'free'`
/// re-check means two writers can never both claim the same row.
/// Returns `None` when the zone has no free ticket left.
pub fn claim_free_ticket(
    conn: &Connection,
    zone_id: &str,
    payment_id: &str,
) -> Result<Option<Ticket>> {
    let now = now();
    query_one(
        conn,
        &format!(
            "UPDATE tickets SET status = 'sold', payment_id = ?1, sold_at = ?2
             WHERE id = (
                 SELECT id FROM tickets WHERE zone_id = ?3 AND status = 'free'
                 ORDER BY created_at ASC, id ASC LIMIT 1
             ) AND status = 'free'
             RETURNING {}",
            TICKET_COLS
        ),
        &[&payment_id, &now, &zone_id],
    )
}

pub fn get_ticket_in_zone(conn: &Connection, zone_id: &str, id: &str) -> Result<Option<Ticket>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tickets WHERE id = ?1 AND zone_id = ?2", TICKET_COLS),
        &[&id, &zone_id],
    )
}

/// Delete one ticket if it is still free. Sold or reserved tickets are never removed.
pub fn delete_free_ticket(conn: &Connection, zone_id: &str, id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM tickets WHERE id = ?1 AND zone_id = ?2 AND status = 'free'",
        params![id, zone_id],
    )?;
    Ok(deleted > 0)
}

/// Clear the unsold inventory of a zone. Returns the number of tickets removed.
pub fn delete_free_tickets(conn: &Connection, zone_id: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM tickets WHERE zone_id = ?1 AND status = 'free'",
        params![zone_id],
    )?;
    Ok(deleted)
}

pub fn get_tickets_for_payment(conn: &Connection, payment_id: &str) -> Result<Vec<Ticket>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM tickets WHERE payment_id = ?1 ORDER BY sold_at ASC",
            TICKET_COLS
        ),
        &[&payment_id],
    )
}

pub fn list_tickets_for_zone_paginated(
    conn: &Connection,
    zone_id: &str,
    status: Option<TicketStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Ticket>, i64)> {
    let mut conditions = vec!["zone_id = ?"];
    let mut values: Vec<Value> = vec![zone_id.to_string().into()];
    if let Some(status) = status {
        conditions.push("status = ?");
        values.push(status.as_ref().to_string().into());
    }
    let where_clause = conditions.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM tickets WHERE {}", where_clause),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(limit.into());
    values.push(offset.into());
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tickets WHERE {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        TICKET_COLS, where_clause
    ))?;
    let tickets = stmt
        .query_map(
            rusqlite::params_from_iter(values.iter()),
            <Ticket as FromRow>::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((tickets, total))
}

pub fn get_ticket_stats(conn: &Connection, zone_id: &str) -> Result<TicketStats> {
    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM tickets WHERE zone_id = ?1 GROUP BY status")?;
    let rows = stmt
        .query_map(params![zone_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stats = TicketStats::default();
    for (status, count) in rows {
        match status.parse::<TicketStatus>() {
            Ok(TicketStatus::Free) => stats.free = count,
            Ok(TicketStatus::Reserved) => stats.reserved = count,
            Ok(TicketStatus::Sold) => stats.sold = count,
            Ok(TicketStatus::Expired) => stats.expired = count,
            Err(_) => {
                return Err(AppError::Internal(format!(
                    "Unknown ticket status in database: {}",
                    status
                )));
            }
        }
        stats.total += count;
    }
    Ok(stats)
}

// ============ Payments ============

pub fn create_payment(conn: &Connection, input: &CreatePayment) -> Result<Payment> {
    let id = EntityType::Payment.gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO payments (id, zone_id, pricing_id, amount, currency, phone, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        params![
            &id,
            &input.zone_id,
            &input.pricing_id,
            input.amount,
            &input.currency,
            &input.phone,
            now
        ],
    )?;
    Ok(Payment {
        id,
        external_ref: None,
        zone_id: input.zone_id.clone(),
        pricing_id: input.pricing_id.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        phone: input.phone.clone(),
        status: PaymentStatus::Pending,
        transaction_id: None,
        needs_reconciliation: false,
        created_at: now,
        completed_at: None,
        failed_at: None,
        last_polled_at: None,
    })
}

/// Attach the gateway reference once the checkout exists. Set at most once.
pub fn set_payment_external_ref(conn: &Connection, id: &str, external_ref: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET external_ref = ?1 WHERE id = ?2 AND external_ref IS NULL",
        params![external_ref, id],
    )?;
    Ok(affected > 0)
}

pub fn get_payment_by_id(conn: &Connection, id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        &[&id],
    )
}

pub fn get_payment_by_external_ref(conn: &Connection, external_ref: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE external_ref = ?1", PAYMENT_COLS),
        &[&external_ref],
    )
}

/// Look a payment up by either our id or the gateway reference.
pub fn get_payment_by_reference(conn: &Connection, reference: &str) -> Result<Option<Payment>> {
    if is_payment_id(reference) {
        get_payment_by_id(conn, reference)
    } else {
        get_payment_by_external_ref(conn, reference)
    }
}

/// Compare-and-swap `pending -> completed`. Returns false if the payment was
/// already terminal, meaning another signal won the transition.
pub fn try_complete_payment(
    conn: &Connection,
    id: &str,
    transaction_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET status = 'completed', completed_at = ?1,
                transaction_id = COALESCE(?2, transaction_id)
         WHERE id = ?3 AND status = 'pending'",
        params![now(), transaction_id, id],
    )?;
    Ok(affected > 0)
}

/// Compare-and-swap `pending -> failed`.
pub fn try_fail_payment(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET status = 'failed', failed_at = ?1 WHERE id = ?2 AND status = 'pending'",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

pub fn set_payment_reconciliation(conn: &Connection, id: &str, needed: bool) -> Result<()> {
    conn.execute(
        "UPDATE payments SET needs_reconciliation = ?1 WHERE id = ?2",
        params![needed as i32, id],
    )?;
    Ok(())
}

pub fn list_payments_for_zone_paginated(
    conn: &Connection,
    zone_id: &str,
    filters: &PaymentFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Payment>, i64)> {
    let mut conditions = vec!["zone_id = ?"];
    let mut values: Vec<Value> = vec![zone_id.to_string().into()];
    if let Some(status) = filters.status {
        conditions.push("status = ?");
        values.push(status.as_ref().to_string().into());
    }
    let where_clause = conditions.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM payments WHERE {}", where_clause),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(limit.into());
    values.push(offset.into());
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payments WHERE {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        PAYMENT_COLS, where_clause
    ))?;
    let payments = stmt
        .query_map(
            rusqlite::params_from_iter(values.iter()),
            <Payment as FromRow>::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((payments, total))
}

/// Completed payments still waiting for a ticket (inventory ran out at confirmation time).
pub fn list_payments_needing_reconciliation(conn: &Connection) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE needs_reconciliation = 1 ORDER BY completed_at ASC",
            PAYMENT_COLS
        ),
        &[],
    )
}

/// Pending payments with a gateway reference, created at or before `created_before`.
///
/// Never-polled payments come first, then the least recently polled, so a
/// bounded sweep rotates through a backlog of abandoned checkouts instead of
/// re-polling the same oldest rows forever.
pub fn list_stale_pending_payments(
    conn: &Connection,
    created_before: i64,
    limit: i64,
) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments
             WHERE status = 'pending' AND external_ref IS NOT NULL AND created_at <= ?1
             ORDER BY last_polled_at ASC NULLS FIRST, created_at ASC, id ASC LIMIT ?2",
            PAYMENT_COLS
        ),
        &[&created_before, &limit],
    )
}

pub fn mark_payment_polled(conn: &Connection, id: &str, at: i64) -> Result<()> {
    conn.execute(
        "UPDATE payments SET last_polled_at = ?1 WHERE id = ?2",
        params![at, id],
    )?;
    Ok(())
}

// ============ Payment Idempotency ============

pub fn get_idempotency_record(conn: &Connection, key: &str) -> Result<Option<IdempotencyRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payment_idempotency WHERE idempotency_key = ?1",
            IDEMPOTENCY_COLS
        ),
        &[&key],
    )
}

/// Record a processed signal. Returns false if the key was already present;
/// the first writer wins and later writers leave the record untouched.
pub fn try_record_idempotency(conn: &Connection, key: &str, payment_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO payment_idempotency (idempotency_key, payment_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![key, payment_id, now()],
    )?;
    Ok(affected > 0)
}

pub fn list_idempotency_records_for_payment(
    conn: &Connection,
    payment_id: &str,
) -> Result<Vec<IdempotencyRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_idempotency WHERE payment_id = ?1 ORDER BY created_at ASC",
            IDEMPOTENCY_COLS
        ),
        &[&payment_id],
    )
}
