//! Coach billing summary tests: revenue, MRR, and null tolerance.

mod common;

use common::*;

#[test]
fn test_revenue_counts_only_paid_invoices() {
    let conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
    let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");

    record_test_payment(&conn, &athlete.id, &coach.id, "in_001", 20000, PaymentOutcome::Paid);
    record_test_payment(&conn, &athlete.id, &coach.id, "in_002", 20000, PaymentOutcome::Paid);
    record_test_payment(&conn, &athlete.id, &coach.id, "in_003", 20000, PaymentOutcome::Failed);

    assert_eq!(
        queries::coach_total_revenue_cents(&conn, &coach.id).unwrap(),
        40000
    );
}

#[test]
fn test_revenue_is_scoped_to_the_coach() {
    let conn = setup_test_db();
    let (coach_a, _) = create_test_coach(&conn, "a@test.com", Some(BillingMode::Platform), None);
    let (coach_b, _) = create_test_coach(&conn, "b@test.com", Some(BillingMode::Platform), None);
    let (athlete_a, _) = create_test_athlete(&conn, &coach_a.id, "aa@test.com");
    let (athlete_b, _) = create_test_athlete(&conn, &coach_b.id, "bb@test.com");

    record_test_payment(&conn, &athlete_a.id, &coach_a.id, "in_a", 10000, PaymentOutcome::Paid);
    record_test_payment(&conn, &athlete_b.id, &coach_b.id, "in_b", 30000, PaymentOutcome::Paid);

    assert_eq!(queries::coach_total_revenue_cents(&conn, &coach_a.id).unwrap(), 10000);
    assert_eq!(queries::coach_total_revenue_cents(&conn, &coach_b.id).unwrap(), 30000);
}

#[test]
fn test_mrr_counts_only_active_profiles() {
    let conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
    let (a1, _) = create_test_athlete(&conn, &coach.id, "a1@test.com");
    let (a2, _) = create_test_athlete(&conn, &coach.id, "a2@test.com");
    let (a3, _) = create_test_athlete(&conn, &coach.id, "a3@test.com");

    create_test_profile(&conn, &a1.id, &coach.id, PaymentStatus::Active, false, 20000);
    create_test_profile(&conn, &a2.id, &coach.id, PaymentStatus::Active, false, 15000);
    create_test_profile(&conn, &a3.id, &coach.id, PaymentStatus::PastDue, true, 20000);

    assert_eq!(queries::coach_mrr_cents(&conn, &coach.id).unwrap(), 35000);
}

#[test]
fn test_empty_roster_yields_zeros() {
    let conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);

    assert_eq!(queries::coach_total_revenue_cents(&conn, &coach.id).unwrap(), 0);
    assert_eq!(queries::coach_mrr_cents(&conn, &coach.id).unwrap(), 0);
    assert!(queries::coach_athlete_billing_views(&conn, &coach.id)
        .unwrap()
        .is_empty());
}

#[test]
fn test_views_tolerate_missing_profile_and_payments() {
    let conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
    let (billed, _) = create_test_athlete(&conn, &coach.id, "billed@test.com");
    let (fresh, _) = create_test_athlete(&conn, &coach.id, "fresh@test.com");

    create_test_profile(&conn, &billed.id, &coach.id, PaymentStatus::Active, false, 20000);
    record_test_payment(&conn, &billed.id, &coach.id, "in_001", 20000, PaymentOutcome::Paid);

    let views = queries::coach_athlete_billing_views(&conn, &coach.id).unwrap();
    assert_eq!(views.len(), 2);

    let billed_view = views.iter().find(|v| v.athlete_id == billed.id).unwrap();
    assert_eq!(billed_view.payment_status, Some(PaymentStatus::Active));
    assert_eq!(billed_view.amount_cents, Some(20000));
    assert_eq!(billed_view.locked, Some(false));
    assert!(billed_view.last_paid_at.is_some());

    // No profile, no payments: billing fields are all null, row still present
    let fresh_view = views.iter().find(|v| v.athlete_id == fresh.id).unwrap();
    assert_eq!(fresh_view.payment_status, None);
    assert_eq!(fresh_view.amount_cents, None);
    assert_eq!(fresh_view.locked, None);
    assert_eq!(fresh_view.last_paid_at, None);
    assert_eq!(fresh_view.email, "fresh@test.com");
}

#[test]
fn test_views_exclude_other_coaches_athletes() {
    let conn = setup_test_db();
    let (coach_a, _) = create_test_coach(&conn, "a@test.com", Some(BillingMode::Platform), None);
    let (coach_b, _) = create_test_coach(&conn, "b@test.com", Some(BillingMode::Platform), None);
    create_test_athlete(&conn, &coach_a.id, "mine@test.com");
    create_test_athlete(&conn, &coach_b.id, "theirs@test.com");

    let views = queries::coach_athlete_billing_views(&conn, &coach_a.id).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].email, "mine@test.com");
}
