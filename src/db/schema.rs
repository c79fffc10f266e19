use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Wi-Fi zones (one hotspot location, its own inventory and price list)
        CREATE TABLE IF NOT EXISTS zones (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            location TEXT,
            description TEXT,
            router_ip TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Price tiers offered on the captive portal
        CREATE TABLE IF NOT EXISTS pricings (
            id TEXT PRIMARY KEY,
            zone_id TEXT NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            duration_hours INTEGER NOT NULL CHECK (duration_hours > 0),
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pricings_zone ON pricings(zone_id);

        -- Purchase attempts. external_ref is NULL until the gateway issued a checkout.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            external_ref TEXT UNIQUE,
            zone_id TEXT NOT NULL REFERENCES zones(id),
            pricing_id TEXT REFERENCES pricings(id) ON DELETE SET NULL,
            amount INTEGER NOT NULL,
            currency TEXT NOT NULL,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed', 'failed')),
            transaction_id TEXT,
            needs_reconciliation INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            completed_at INTEGER,
            failed_at INTEGER,
            last_polled_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_payments_zone ON payments(zone_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_payments_sweep ON payments(last_polled_at, created_at) WHERE status = 'pending';
        CREATE INDEX IF NOT EXISTS idx_payments_reconciliation ON payments(id) WHERE needs_reconciliation = 1;

        -- Prepaid access credentials. A ticket is sold once and never reused.
        CREATE TABLE IF NOT EXISTS tickets (
            id TEXT PRIMARY KEY,
            zone_id TEXT NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
            username TEXT NOT NULL,
            password TEXT NOT NULL,
            profile TEXT,
            status TEXT NOT NULL DEFAULT 'free' CHECK (status IN ('free', 'reserved', 'sold', 'expired')),
            payment_id TEXT REFERENCES payments(id),
            sold_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(zone_id, username)
        );
        CREATE INDEX IF NOT EXISTS idx_tickets_zone_status ON tickets(zone_id, status);
        -- At most one live ticket per payment
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_payment
            ON tickets(payment_id) WHERE payment_id IS NOT NULL AND status != 'expired';

        -- Processed completion signals (webhook deliveries and verified polls)
        CREATE TABLE IF NOT EXISTS payment_idempotency (
            idempotency_key TEXT PRIMARY KEY,
            payment_id TEXT NOT NULL REFERENCES payments(id),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payment_idempotency_payment ON payment_idempotency(payment_id);
        "#,
    )?;
    Ok(())
}
