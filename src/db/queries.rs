use chrono::Utc;
use rusqlite::{params, Connection};

use crate::billing::status::PaymentStatus;
use crate::crypto::hash_api_token;
use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, BILLING_PROFILE_COLS, CHECKIN_COLS, PAYMENT_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Users ============

/// Create a user. `api_token` is the plaintext token; only its hash is stored.
pub fn create_user(conn: &Connection, input: &CreateUser, api_token: &str) -> Result<User> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();
    let token_hash = hash_api_token(api_token);

    conn.execute(
        "INSERT INTO users (id, email, name, role, coach_id, billing_mode, monthly_fee_cents,
                            payment_status, locked, api_token_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'trial', 0, ?8, ?9, ?9)",
        params![
            &id,
            &email,
            &input.name,
            input.role.as_str(),
            &input.coach_id,
            input.billing_mode.map(|m| m.as_str()),
            input.monthly_fee_cents,
            &token_hash,
            now,
        ],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        role: input.role,
        coach_id: input.coach_id.clone(),
        billing_mode: input.billing_mode,
        monthly_fee_cents: input.monthly_fee_cents,
        payment_status: PaymentStatus::Trial,
        locked: false,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn get_user_by_api_token(conn: &Connection, token: &str) -> Result<Option<User>> {
    let hash = hash_api_token(token);
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE api_token_hash = ?1", USER_COLS),
        &[&hash],
    )
}

pub fn list_athletes_for_coach(conn: &Connection, coach_id: &str) -> Result<Vec<User>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM users WHERE coach_id = ?1 AND role = 'athlete' ORDER BY created_at",
            USER_COLS
        ),
        &[&coach_id],
    )
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

/// Write the denormalized billing mirror on a user row.
///
/// Only the billing write path (`billing::apply_*`) should call this, and
/// always in the same transaction as the billing_profiles write.
pub fn set_user_billing_state(
    conn: &Connection,
    user_id: &str,
    status: PaymentStatus,
    locked: bool,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET payment_status = ?1, locked = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), locked, now(), user_id],
    )?;
    Ok(())
}

pub fn set_coach_monthly_fee(conn: &Connection, coach_id: &str, fee_cents: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET monthly_fee_cents = ?1, updated_at = ?2 WHERE id = ?3",
        params![fee_cents, now(), coach_id],
    )?;
    Ok(())
}

// ============ Billing profiles ============

pub fn create_billing_profile(
    conn: &Connection,
    input: &CreateBillingProfile,
) -> Result<BillingProfile> {
    let id = EntityType::BillingProfile.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO billing_profiles (id, athlete_id, coach_id, stripe_customer_id,
             stripe_subscription_id, stripe_subscription_item_id, stripe_price_id,
             amount_cents, currency, payment_status, locked, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            &id,
            &input.athlete_id,
            &input.coach_id,
            &input.stripe_customer_id,
            &input.stripe_subscription_id,
            &input.stripe_subscription_item_id,
            &input.stripe_price_id,
            input.amount_cents,
            &input.currency,
            input.payment_status.as_str(),
            input.locked,
            now,
        ],
    )?;

    Ok(BillingProfile {
        id,
        athlete_id: input.athlete_id.clone(),
        coach_id: input.coach_id.clone(),
        stripe_customer_id: input.stripe_customer_id.clone(),
        stripe_subscription_id: input.stripe_subscription_id.clone(),
        stripe_subscription_item_id: input.stripe_subscription_item_id.clone(),
        stripe_price_id: input.stripe_price_id.clone(),
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        payment_status: input.payment_status,
        locked: input.locked,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_billing_profile_by_athlete(
    conn: &Connection,
    athlete_id: &str,
) -> Result<Option<BillingProfile>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM billing_profiles WHERE athlete_id = ?1",
            BILLING_PROFILE_COLS
        ),
        &[&athlete_id],
    )
}

pub fn get_billing_profile_by_subscription(
    conn: &Connection,
    subscription_id: &str,
) -> Result<Option<BillingProfile>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM billing_profiles WHERE stripe_subscription_id = ?1",
            BILLING_PROFILE_COLS
        ),
        &[&subscription_id],
    )
}

pub fn get_billing_profile_by_customer(
    conn: &Connection,
    customer_id: &str,
) -> Result<Option<BillingProfile>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM billing_profiles WHERE stripe_customer_id = ?1",
            BILLING_PROFILE_COLS
        ),
        &[&customer_id],
    )
}

/// Update a profile's subscription identifiers and status in one statement.
///
/// Identifier fields use COALESCE so a reconciliation path that learned only
/// some identifiers (e.g. an invoice without a subscription id) never blanks
/// values another path already wrote. Status and lock are always overwritten.
pub fn update_billing_profile_state(
    conn: &Connection,
    profile_id: &str,
    ids: &SubscriptionIdentifiers,
    status: PaymentStatus,
    locked: bool,
) -> Result<()> {
    conn.execute(
        "UPDATE billing_profiles SET
             stripe_customer_id = COALESCE(?1, stripe_customer_id),
             stripe_subscription_id = COALESCE(?2, stripe_subscription_id),
             stripe_subscription_item_id = COALESCE(?3, stripe_subscription_item_id),
             stripe_price_id = COALESCE(?4, stripe_price_id),
             amount_cents = COALESCE(?5, amount_cents),
             currency = COALESCE(?6, currency),
             payment_status = ?7,
             locked = ?8,
             updated_at = ?9
         WHERE id = ?10",
        params![
            &ids.stripe_customer_id,
            &ids.stripe_subscription_id,
            &ids.stripe_subscription_item_id,
            &ids.stripe_price_id,
            ids.amount_cents,
            &ids.currency,
            status.as_str(),
            locked,
            now(),
            profile_id,
        ],
    )?;
    Ok(())
}

pub fn update_billing_profile_price(
    conn: &Connection,
    profile_id: &str,
    price_id: &str,
    amount_cents: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE billing_profiles SET stripe_price_id = ?1, amount_cents = ?2, updated_at = ?3
         WHERE id = ?4",
        params![price_id, amount_cents, now(), profile_id],
    )?;
    Ok(())
}

// ============ Payments ============

/// Insert or update the ledger row for an invoice.
///
/// Keyed on the provider invoice id: at-least-once webhook delivery must
/// update the existing row, never create a duplicate.
pub fn upsert_payment(conn: &Connection, input: &UpsertPayment) -> Result<Payment> {
    let id = EntityType::Payment.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO payments (id, athlete_id, coach_id, stripe_invoice_id, stripe_charge_id,
             amount_cents, currency, status, invoice_url, invoice_pdf_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(stripe_invoice_id) DO UPDATE SET
             stripe_charge_id = excluded.stripe_charge_id,
             amount_cents = excluded.amount_cents,
             currency = excluded.currency,
             status = excluded.status,
             invoice_url = excluded.invoice_url,
             invoice_pdf_url = excluded.invoice_pdf_url",
        params![
            &id,
            &input.athlete_id,
            &input.coach_id,
            &input.stripe_invoice_id,
            &input.stripe_charge_id,
            input.amount_cents,
            &input.currency,
            input.status.as_str(),
            &input.invoice_url,
            &input.invoice_pdf_url,
            now,
        ],
    )?;

    // Re-read so the caller sees the surviving row (insert or update)
    get_payment_by_invoice(conn, &input.stripe_invoice_id)?.ok_or_else(|| {
        crate::error::AppError::Internal("payment row missing after upsert".into())
    })
}

pub fn get_payment_by_invoice(
    conn: &Connection,
    stripe_invoice_id: &str,
) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE stripe_invoice_id = ?1",
            PAYMENT_COLS
        ),
        &[&stripe_invoice_id],
    )
}

pub fn list_payments_for_athlete(conn: &Connection, athlete_id: &str) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE athlete_id = ?1 ORDER BY created_at DESC",
            PAYMENT_COLS
        ),
        &[&athlete_id],
    )
}

pub fn count_payments_for_athlete(conn: &Connection, athlete_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE athlete_id = ?1",
        params![athlete_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============ Check-ins ============

pub fn create_checkin(
    conn: &Connection,
    athlete_id: &str,
    input: &CreateCheckIn,
) -> Result<CheckIn> {
    let id = EntityType::CheckIn.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO checkins (id, athlete_id, weight_kg, energy, sleep_quality, stress, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            athlete_id,
            input.weight_kg,
            input.energy,
            input.sleep_quality,
            input.stress,
            &input.notes,
            now,
        ],
    )?;

    Ok(CheckIn {
        id,
        athlete_id: athlete_id.to_string(),
        weight_kg: input.weight_kg,
        energy: input.energy,
        sleep_quality: input.sleep_quality,
        stress: input.stress,
        notes: input.notes.clone(),
        created_at: now,
    })
}

pub fn count_checkins_for_athlete(conn: &Connection, athlete_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM checkins WHERE athlete_id = ?1",
        params![athlete_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_checkins_for_athlete(conn: &Connection, athlete_id: &str) -> Result<Vec<CheckIn>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM checkins WHERE athlete_id = ?1 ORDER BY created_at DESC",
            CHECKIN_COLS
        ),
        &[&athlete_id],
    )
}

// ============ Coach billing summary ============

pub fn coach_total_revenue_cents(conn: &Connection, coach_id: &str) -> Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments
         WHERE coach_id = ?1 AND status = 'paid'",
        params![coach_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn coach_mrr_cents(conn: &Connection, coach_id: &str) -> Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM billing_profiles
         WHERE coach_id = ?1 AND payment_status = 'active'",
        params![coach_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Per-athlete billing projection for a coach's roster.
///
/// LEFT JOINs tolerate athletes with no billing profile (null billing fields)
/// and athletes with no paid invoices yet (null last_paid_at).
pub fn coach_athlete_billing_views(
    conn: &Connection,
    coach_id: &str,
) -> Result<Vec<AthleteBillingView>> {
    query_all(
        conn,
        "SELECT u.id, u.name, u.email,
                bp.amount_cents, bp.currency, bp.payment_status, bp.locked,
                lp.last_paid_at
         FROM users u
         LEFT JOIN billing_profiles bp ON bp.athlete_id = u.id
         LEFT JOIN (
             SELECT athlete_id, MAX(created_at) AS last_paid_at
             FROM payments WHERE status = 'paid'
             GROUP BY athlete_id
         ) lp ON lp.athlete_id = u.id
         WHERE u.coach_id = ?1 AND u.role = 'athlete'
         ORDER BY u.created_at",
        &[&coach_id],
    )
}

/// Look up an athlete and verify coach ownership in one shot.
pub fn get_owned_athlete(
    conn: &Connection,
    coach_id: &str,
    athlete_id: &str,
) -> Result<Option<User>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM users WHERE id = ?1 AND coach_id = ?2 AND role = 'athlete'",
            USER_COLS
        ),
        &[&athlete_id, &coach_id],
    )
}
