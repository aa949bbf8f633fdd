//! Test utilities and fixtures for coachdesk integration tests

#![allow(dead_code)]

use rusqlite::Connection;

pub use coachdesk::billing::{self, PaymentStatus, SubscriptionSnapshot};
pub use coachdesk::crypto::generate_api_token;
pub use coachdesk::db::{init_db, queries};
pub use coachdesk::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a coach with the given billing mode and default fee
pub fn create_test_coach(
    conn: &Connection,
    email: &str,
    billing_mode: Option<BillingMode>,
    monthly_fee_cents: Option<i64>,
) -> (User, String) {
    let token = generate_api_token();
    let coach = queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Coach {}", email),
            role: Role::Coach,
            coach_id: None,
            billing_mode,
            monthly_fee_cents,
        },
        &token,
    )
    .expect("Failed to create test coach");
    (coach, token)
}

/// Create an athlete on a coach's roster (starts in trial, unlocked)
pub fn create_test_athlete(conn: &Connection, coach_id: &str, email: &str) -> (User, String) {
    let token = generate_api_token();
    let athlete = queries::create_user(
        conn,
        &CreateUser {
            email: email.to_string(),
            name: format!("Athlete {}", email),
            role: Role::Athlete,
            coach_id: Some(coach_id.to_string()),
            billing_mode: None,
            monthly_fee_cents: None,
        },
        &token,
    )
    .expect("Failed to create test athlete");
    (athlete, token)
}

/// Create a billing profile in a given state
pub fn create_test_profile(
    conn: &Connection,
    athlete_id: &str,
    coach_id: &str,
    status: PaymentStatus,
    locked: bool,
    amount_cents: i64,
) -> BillingProfile {
    queries::create_billing_profile(
        conn,
        &CreateBillingProfile {
            athlete_id: athlete_id.to_string(),
            coach_id: coach_id.to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_subscription_item_id: None,
            stripe_price_id: None,
            amount_cents,
            currency: "usd".to_string(),
            payment_status: status,
            locked,
        },
    )
    .expect("Failed to create test billing profile")
}

/// A fully-populated subscription snapshot as the confirmation path or a
/// checkout webhook would build it
pub fn active_snapshot(suffix: &str) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        raw_status: "active".to_string(),
        identifiers: SubscriptionIdentifiers {
            stripe_customer_id: Some(format!("cus_{}", suffix)),
            stripe_subscription_id: Some(format!("sub_{}", suffix)),
            stripe_subscription_item_id: Some(format!("si_{}", suffix)),
            stripe_price_id: Some(format!("price_{}", suffix)),
            amount_cents: Some(20000),
            currency: Some("usd".to_string()),
        },
    }
}

/// Record a paid or failed invoice for an athlete
pub fn record_test_payment(
    conn: &Connection,
    athlete_id: &str,
    coach_id: &str,
    invoice_id: &str,
    amount_cents: i64,
    status: PaymentOutcome,
) -> Payment {
    queries::upsert_payment(
        conn,
        &UpsertPayment {
            athlete_id: athlete_id.to_string(),
            coach_id: coach_id.to_string(),
            stripe_invoice_id: invoice_id.to_string(),
            stripe_charge_id: None,
            amount_cents,
            currency: "usd".to_string(),
            status,
            invoice_url: None,
            invoice_pdf_url: None,
        },
    )
    .expect("Failed to record test payment")
}
