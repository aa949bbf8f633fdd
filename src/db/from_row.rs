//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::billing::status::PaymentStatus;
use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T>(
    row: &Row,
    col: usize,
    col_name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let s: String = row.get(col)?;
    parse(&s).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
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

pub const USER_COLS: &str = "id, email, name, role, coach_id, billing_mode, monthly_fee_cents, payment_status, locked, created_at, updated_at";

pub const BILLING_PROFILE_COLS: &str = "id, athlete_id, coach_id, stripe_customer_id, stripe_subscription_id, stripe_subscription_item_id, stripe_price_id, amount_cents, currency, payment_status, locked, created_at, updated_at";

pub const PAYMENT_COLS: &str = "id, athlete_id, coach_id, stripe_invoice_id, stripe_charge_id, amount_cents, currency, status, invoice_url, invoice_pdf_url, created_at";

pub const CHECKIN_COLS: &str =
    "id, athlete_id, weight_kg, energy, sleep_quality, stress, notes, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let billing_mode: Option<BillingMode> = row
            .get::<_, Option<String>>(5)?
            .and_then(|s| BillingMode::from_str(&s));
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: parse_enum(row, 3, "role", Role::from_str)?,
            coach_id: row.get(4)?,
            billing_mode,
            monthly_fee_cents: row.get(6)?,
            payment_status: parse_enum(row, 7, "payment_status", PaymentStatus::parse)?,
            locked: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for BillingProfile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BillingProfile {
            id: row.get(0)?,
            athlete_id: row.get(1)?,
            coach_id: row.get(2)?,
            stripe_customer_id: row.get(3)?,
            stripe_subscription_id: row.get(4)?,
            stripe_subscription_item_id: row.get(5)?,
            stripe_price_id: row.get(6)?,
            amount_cents: row.get(7)?,
            currency: row.get(8)?,
            payment_status: parse_enum(row, 9, "payment_status", PaymentStatus::parse)?,
            locked: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            athlete_id: row.get(1)?,
            coach_id: row.get(2)?,
            stripe_invoice_id: row.get(3)?,
            stripe_charge_id: row.get(4)?,
            amount_cents: row.get(5)?,
            currency: row.get(6)?,
            status: parse_enum(row, 7, "status", PaymentOutcome::from_str)?,
            invoice_url: row.get(8)?,
            invoice_pdf_url: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for AthleteBillingView {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let payment_status: Option<PaymentStatus> = row
            .get::<_, Option<String>>(5)?
            .and_then(|s| PaymentStatus::parse(&s));
        Ok(AthleteBillingView {
            athlete_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            amount_cents: row.get(3)?,
            currency: row.get(4)?,
            payment_status,
            locked: row.get(6)?,
            last_paid_at: row.get(7)?,
        })
    }
}

impl FromRow for CheckIn {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CheckIn {
            id: row.get(0)?,
            athlete_id: row.get(1)?,
            weight_kg: row.get(2)?,
            energy: row.get(3)?,
            sleep_quality: row.get(4)?,
            stress: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
