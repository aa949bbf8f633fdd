//! Webhook signature verification and event dispatch tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use hmac::{Hmac, Mac};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

use common::*;

use coachdesk::db::AppState;
use coachdesk::handlers;
use coachdesk::payments::StripeClient;

const SECRET: &str = "whsec_test_secret";

fn sign(payload: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac =
        Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("HMAC accepts any key length");
    mac.update(signed_payload.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("t={},v1={}", timestamp, sig)
}

fn client() -> StripeClient {
    StripeClient::new("sk_test_key", SECRET)
}

#[test]
fn test_valid_signature_passes() {
    let payload = r#"{"type":"invoice.payment_succeeded"}"#;
    let header = sign(payload, Utc::now().timestamp());

    let ok = client()
        .verify_webhook_signature(payload.as_bytes(), &header)
        .unwrap();
    assert!(ok);
}

#[test]
fn test_tampered_payload_fails() {
    let payload = r#"{"type":"invoice.payment_succeeded"}"#;
    let header = sign(payload, Utc::now().timestamp());

    let ok = client()
        .verify_webhook_signature(br#"{"type":"invoice.payment_failed"}"#, &header)
        .unwrap();
    assert!(!ok);
}

#[test]
fn test_wrong_secret_fails() {
    let payload = r#"{"type":"invoice.payment_succeeded"}"#;
    let timestamp = Utc::now().timestamp();
    let signed_payload = format!("{}.{}", timestamp, payload);
    let mut mac = Hmac::<Sha256>::new_from_slice(b"whsec_other_secret").unwrap();
    mac.update(signed_payload.as_bytes());
    let header = format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()));

    let ok = client()
        .verify_webhook_signature(payload.as_bytes(), &header)
        .unwrap();
    assert!(!ok);
}

#[test]
fn test_stale_timestamp_rejected() {
    let payload = r#"{"type":"invoice.payment_succeeded"}"#;
    // 10 minutes old, past the 5 minute tolerance
    let header = sign(payload, Utc::now().timestamp() - 600);

    let ok = client()
        .verify_webhook_signature(payload.as_bytes(), &header)
        .unwrap();
    assert!(!ok);
}

#[test]
fn test_timestamp_within_tolerance_accepted() {
    let payload = r#"{"type":"invoice.payment_succeeded"}"#;
    let header = sign(payload, Utc::now().timestamp() - 120);

    let ok = client()
        .verify_webhook_signature(payload.as_bytes(), &header)
        .unwrap();
    assert!(ok);
}

#[test]
fn test_future_timestamp_rejected() {
    let payload = r#"{"type":"invoice.payment_succeeded"}"#;
    // 5 minutes in the future, beyond the 60s skew allowance
    let header = sign(payload, Utc::now().timestamp() + 300);

    let ok = client()
        .verify_webhook_signature(payload.as_bytes(), &header)
        .unwrap();
    assert!(!ok);
}

#[test]
fn test_malformed_header_is_an_error() {
    let payload = r#"{}"#;

    assert!(client()
        .verify_webhook_signature(payload.as_bytes(), "not-a-signature")
        .is_err());
    assert!(client()
        .verify_webhook_signature(payload.as_bytes(), "v1=deadbeef")
        .is_err());
    assert!(client()
        .verify_webhook_signature(payload.as_bytes(), "t=notanumber,v1=deadbeef")
        .is_err());
}

#[test]
fn test_wrong_length_signature_fails_cleanly() {
    let payload = r#"{}"#;
    let header = format!("t={},v1=abc", Utc::now().timestamp());

    let ok = client()
        .verify_webhook_signature(payload.as_bytes(), &header)
        .unwrap();
    assert!(!ok);
}

// ============ End-to-end dispatch ============

/// Single-connection pool so every handler call and every assertion sees the
/// same in-memory database.
fn test_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("Failed to build test pool");
    coachdesk::db::init_db(&pool.get().unwrap()).expect("Failed to initialize schema");

    AppState {
        db: pool,
        stripe: Some(StripeClient::new("sk_test_key", SECRET)),
        app_base_url: "http://localhost:3000".to_string(),
        default_monthly_fee_cents: 20000,
        currency: "usd".to_string(),
    }
}

async fn deliver(state: &AppState, payload: &str, header: Option<&str>) -> StatusCode {
    let app = handlers::router(state.clone());
    let mut builder = Request::builder().method("POST").uri("/api/stripe/webhook");
    if let Some(sig) = header {
        builder = builder.header("stripe-signature", sig);
    }
    let request = builder.body(Body::from(payload.to_string())).unwrap();
    app.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_unsigned_delivery_is_rejected() {
    let state = test_state();
    let payload = json!({"type": "invoice.payment_succeeded", "data": {"object": {}}}).to_string();

    assert_eq!(deliver(&state, &payload, None).await, StatusCode::BAD_REQUEST);
    assert_eq!(
        deliver(&state, &payload, Some("t=1,v1=deadbeef")).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_subscription_updated_reconciles_profile_and_mirror() {
    let state = test_state();
    {
        let mut conn = state.db.get().unwrap();
        let (coach, _) =
            create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
        let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");
        billing::apply_subscription_state(&mut conn, &athlete.id, &coach.id, &active_snapshot("wh"))
            .unwrap();
    }

    let payload = json!({
        "type": "customer.subscription.updated",
        "data": {"object": {
            "id": "sub_wh",
            "status": "past_due",
            "customer": "cus_wh",
            "items": {"data": [{"id": "si_wh", "price": {
                "id": "price_wh", "product": "prod_wh",
                "unit_amount": 20000, "currency": "usd"
            }}]}
        }}
    })
    .to_string();
    let header = sign(&payload, Utc::now().timestamp());

    assert_eq!(deliver(&state, &payload, Some(&header)).await, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let profile = queries::get_billing_profile_by_subscription(&conn, "sub_wh")
        .unwrap()
        .unwrap();
    assert_eq!(profile.payment_status, PaymentStatus::PastDue);
    assert!(profile.locked);

    let user = queries::get_user_by_id(&conn, &profile.athlete_id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::PastDue);
    assert!(user.locked);
}

#[tokio::test]
async fn test_subscription_deleted_forces_canceled() {
    let state = test_state();
    let athlete_id = {
        let mut conn = state.db.get().unwrap();
        let (coach, _) =
            create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
        let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");
        billing::apply_subscription_state(&mut conn, &athlete.id, &coach.id, &active_snapshot("del"))
            .unwrap();
        athlete.id
    };

    // The deleted payload still says "canceled" or "active" depending on
    // timing; the handler must not care
    let payload = json!({
        "type": "customer.subscription.deleted",
        "data": {"object": {"id": "sub_del", "status": "active", "customer": "cus_del"}}
    })
    .to_string();
    let header = sign(&payload, Utc::now().timestamp());

    assert_eq!(deliver(&state, &payload, Some(&header)).await, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let user = queries::get_user_by_id(&conn, &athlete_id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::Canceled);
    assert!(user.locked);
}

#[tokio::test]
async fn test_invoice_payment_succeeded_records_and_activates() {
    let state = test_state();
    let athlete_id = {
        let mut conn = state.db.get().unwrap();
        let (coach, _) =
            create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
        let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");
        let snapshot = SubscriptionSnapshot {
            raw_status: "past_due".to_string(),
            ..active_snapshot("inv")
        };
        billing::apply_subscription_state(&mut conn, &athlete.id, &coach.id, &snapshot).unwrap();
        athlete.id
    };

    let payload = json!({
        "type": "invoice.payment_succeeded",
        "data": {"object": {
            "id": "in_100", "customer": "cus_inv", "subscription": "sub_inv",
            "charge": "ch_100", "amount_paid": 20000, "amount_due": 20000,
            "currency": "usd",
            "hosted_invoice_url": "https://invoice.example/100",
            "invoice_pdf": "https://invoice.example/100.pdf"
        }}
    })
    .to_string();
    let header = sign(&payload, Utc::now().timestamp());

    assert_eq!(deliver(&state, &payload, Some(&header)).await, StatusCode::OK);
    // Re-delivery of the same event is acknowledged and stays idempotent
    assert_eq!(deliver(&state, &payload, Some(&header)).await, StatusCode::OK);

    let conn = state.db.get().unwrap();
    assert_eq!(queries::count_payments_for_athlete(&conn, &athlete_id).unwrap(), 1);

    let payment = queries::get_payment_by_invoice(&conn, "in_100").unwrap().unwrap();
    assert_eq!(payment.status, PaymentOutcome::Paid);
    assert_eq!(payment.amount_cents, 20000);

    let user = queries::get_user_by_id(&conn, &athlete_id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::Active);
    assert!(!user.locked);
}

#[tokio::test]
async fn test_invoice_payment_failed_marks_past_due() {
    let state = test_state();
    let athlete_id = {
        let mut conn = state.db.get().unwrap();
        let (coach, _) =
            create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
        let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");
        billing::apply_subscription_state(&mut conn, &athlete.id, &coach.id, &active_snapshot("fl"))
            .unwrap();
        athlete.id
    };

    // No subscription reference; resolution falls back to the customer id
    let payload = json!({
        "type": "invoice.payment_failed",
        "data": {"object": {
            "id": "in_200", "customer": "cus_fl", "subscription": null,
            "amount_paid": 0, "amount_due": 20000, "currency": "usd"
        }}
    })
    .to_string();
    let header = sign(&payload, Utc::now().timestamp());

    assert_eq!(deliver(&state, &payload, Some(&header)).await, StatusCode::OK);

    let conn = state.db.get().unwrap();
    let payment = queries::get_payment_by_invoice(&conn, "in_200").unwrap().unwrap();
    assert_eq!(payment.status, PaymentOutcome::Failed);
    assert_eq!(payment.amount_cents, 20000);

    let user = queries::get_user_by_id(&conn, &athlete_id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::PastDue);
    assert!(user.locked);
}

#[tokio::test]
async fn test_events_for_unknown_subscriptions_are_acknowledged() {
    let state = test_state();

    for payload in [
        json!({
            "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_ghost", "status": "past_due", "customer": "cus_ghost"}}
        }),
        json!({
            "type": "invoice.payment_succeeded",
            "data": {"object": {"id": "in_ghost", "customer": "cus_ghost",
                                "subscription": "sub_ghost", "amount_paid": 20000,
                                "amount_due": 20000, "currency": "usd"}}
        }),
        json!({"type": "customer.updated", "data": {"object": {}}}),
    ] {
        let payload = payload.to_string();
        let header = sign(&payload, Utc::now().timestamp());
        assert_eq!(deliver(&state, &payload, Some(&header)).await, StatusCode::OK);
    }

    // Nothing was written
    let conn = state.db.get().unwrap();
    assert!(queries::get_payment_by_invoice(&conn, "in_ghost").unwrap().is_none());
}
