use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (coaches and athletes)
        -- payment_status/locked are denormalized mirrors of billing_profiles,
        -- written only by the billing write path in the same transaction.
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('athlete', 'coach')),
            coach_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            billing_mode TEXT CHECK (billing_mode IS NULL OR billing_mode IN ('platform', 'external')),
            monthly_fee_cents INTEGER,
            payment_status TEXT NOT NULL DEFAULT 'trial',
            locked INTEGER NOT NULL DEFAULT 0,
            api_token_hash TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_coach ON users(coach_id);
        CREATE INDEX IF NOT EXISTS idx_users_token ON users(api_token_hash);

        -- Billing profiles (source of truth for an athlete's payment state)
        -- At most one per athlete; mutated only by confirmation/webhook paths.
        CREATE TABLE IF NOT EXISTS billing_profiles (
            id TEXT PRIMARY KEY,
            athlete_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            coach_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            stripe_customer_id TEXT,
            stripe_subscription_id TEXT,
            stripe_subscription_item_id TEXT,
            stripe_price_id TEXT,
            amount_cents INTEGER NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'usd',
            payment_status TEXT NOT NULL,
            locked INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_billing_profiles_coach ON billing_profiles(coach_id);
        CREATE INDEX IF NOT EXISTS idx_billing_profiles_subscription ON billing_profiles(stripe_subscription_id);
        CREATE INDEX IF NOT EXISTS idx_billing_profiles_customer ON billing_profiles(stripe_customer_id);

        -- Payments (append-only invoice ledger)
        -- stripe_invoice_id is UNIQUE: webhook re-delivery upserts the same row.
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            athlete_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            coach_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            stripe_invoice_id TEXT NOT NULL UNIQUE,
            stripe_charge_id TEXT,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('paid', 'failed')),
            invoice_url TEXT,
            invoice_pdf_url TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_athlete_time ON payments(athlete_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_payments_coach ON payments(coach_id);

        -- Check-ins
        CREATE TABLE IF NOT EXISTS checkins (
            id TEXT PRIMARY KEY,
            athlete_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            weight_kg REAL,
            energy INTEGER,
            sleep_quality INTEGER,
            stress INTEGER,
            notes TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checkins_athlete_time ON checkins(athlete_id, created_at DESC);
        "#,
    )?;
    Ok(())
}
