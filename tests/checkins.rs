//! Access gate and billing lifecycle trigger tests.

mod common;

use common::*;

#[test]
fn test_first_checkin_always_allowed() {
    // Even a fully restricted athlete gets their baseline check-in through
    for (locked, status) in [
        (true, PaymentStatus::Incomplete),
        (true, PaymentStatus::Canceled),
        (false, PaymentStatus::WaitingForCoach),
        (false, PaymentStatus::Trial),
    ] {
        assert!(
            billing::submission_allowed(0, locked, status),
            "first check-in rejected for locked={} status={}",
            locked,
            status
        );
    }
}

#[test]
fn test_subsequent_checkins_gated() {
    assert!(!billing::submission_allowed(1, true, PaymentStatus::Incomplete));
    assert!(!billing::submission_allowed(5, false, PaymentStatus::PastDue));
    assert!(!billing::submission_allowed(1, false, PaymentStatus::WaitingForCoach));
    assert!(!billing::submission_allowed(1, false, PaymentStatus::Canceled));

    assert!(billing::submission_allowed(1, false, PaymentStatus::Active));
    assert!(billing::submission_allowed(10, false, PaymentStatus::Trial));
    // Failed alone does not restrict; only the lock flag would
    assert!(billing::submission_allowed(1, false, PaymentStatus::Failed));
    assert!(!billing::submission_allowed(1, true, PaymentStatus::Failed));
}

#[test]
fn test_billing_clock_platform_coach_goes_incomplete() {
    let mut conn = setup_test_db();
    let (coach, _) =
        create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), Some(20000));
    let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");
    create_test_profile(&conn, &athlete.id, &coach.id, PaymentStatus::Incomplete, true, 20000);

    let (status, locked) = billing::start_billing_clock(&mut conn, &athlete).unwrap();
    assert_eq!(status, PaymentStatus::Incomplete);
    assert!(locked);

    let user = queries::get_user_by_id(&conn, &athlete.id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::Incomplete);
    assert!(user.locked);
}

#[test]
fn test_billing_clock_defaults_to_platform_when_mode_unset() {
    let mut conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", None, None);
    let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");

    let (status, locked) = billing::start_billing_clock(&mut conn, &athlete).unwrap();
    assert_eq!(status, PaymentStatus::Incomplete);
    assert!(locked);
}

#[test]
fn test_billing_clock_external_coach_goes_waiting() {
    let mut conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", Some(BillingMode::External), None);
    let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");

    let (status, locked) = billing::start_billing_clock(&mut conn, &athlete).unwrap();
    assert_eq!(status, PaymentStatus::WaitingForCoach);
    assert!(locked);

    let user = queries::get_user_by_id(&conn, &athlete.id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::WaitingForCoach);
    assert!(user.locked);
}

#[test]
fn test_billing_clock_noop_when_already_started() {
    let mut conn = setup_test_db();
    let (coach, _) = create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), None);
    let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");

    billing::apply_subscription_state(&mut conn, &athlete.id, &coach.id, &active_snapshot("x"))
        .unwrap();
    let athlete = queries::get_user_by_id(&conn, &athlete.id).unwrap().unwrap();

    let (status, locked) = billing::start_billing_clock(&mut conn, &athlete).unwrap();
    assert_eq!(status, PaymentStatus::Active);
    assert!(!locked);
}

#[test]
fn test_access_restricted_matches_status_set() {
    assert!(billing::access_restricted(false, PaymentStatus::Incomplete));
    assert!(billing::access_restricted(false, PaymentStatus::PastDue));
    assert!(billing::access_restricted(false, PaymentStatus::Canceled));
    assert!(billing::access_restricted(false, PaymentStatus::WaitingForCoach));
    assert!(billing::access_restricted(true, PaymentStatus::Active));

    assert!(!billing::access_restricted(false, PaymentStatus::Active));
    assert!(!billing::access_restricted(false, PaymentStatus::Trial));
}

/// Full athlete lifecycle: onboarding, baseline check-in, lockout, checkout,
/// unlock.
#[test]
fn test_lifecycle_onboarding_to_active() {
    let mut conn = setup_test_db();
    let (coach, _) =
        create_test_coach(&conn, "coach@test.com", Some(BillingMode::Platform), Some(20000));
    let (athlete, _) = create_test_athlete(&conn, &coach.id, "athlete@test.com");
    // Eager profile, as the roster endpoint creates it
    create_test_profile(&conn, &athlete.id, &coach.id, PaymentStatus::Incomplete, true, 20000);

    // Fresh athlete: user row is trial/unlocked despite the locked profile
    let user = queries::get_user_by_id(&conn, &athlete.id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::Trial);
    assert!(!user.locked);

    // Check-in #1 passes the gate and starts the clock
    let prior = queries::count_checkins_for_athlete(&conn, &athlete.id).unwrap();
    assert!(billing::submission_allowed(prior, user.locked, user.payment_status));
    queries::create_checkin(&conn, &athlete.id, &CreateCheckIn {
        weight_kg: Some(81.5),
        energy: Some(4),
        sleep_quality: Some(3),
        stress: Some(2),
        notes: None,
    })
    .unwrap();
    billing::start_billing_clock(&mut conn, &user).unwrap();

    // Check-in #2 is now blocked
    let user = queries::get_user_by_id(&conn, &athlete.id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::Incomplete);
    let prior = queries::count_checkins_for_athlete(&conn, &athlete.id).unwrap();
    assert!(!billing::submission_allowed(prior, user.locked, user.payment_status));

    // Checkout completes (confirmation or webhook, either way)
    billing::apply_subscription_state(&mut conn, &athlete.id, &coach.id, &active_snapshot("life"))
        .unwrap();

    let user = queries::get_user_by_id(&conn, &athlete.id).unwrap().unwrap();
    assert_eq!(user.payment_status, PaymentStatus::Active);
    assert!(!user.locked);
    let prior = queries::count_checkins_for_athlete(&conn, &athlete.id).unwrap();
    assert!(billing::submission_allowed(prior, user.locked, user.payment_status));
}
