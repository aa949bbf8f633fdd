//! Billing state machine: the single write path for payment status.
//!
//! Three paths mutate billing state — checkout confirmation, Stripe webhooks,
//! and the first-check-in lifecycle trigger. All of them converge here so the
//! billing profile and the user's denormalized mirror are always written
//! together, inside one SQLite transaction, with the status/lock decision
//! taken by `status::normalize` / `status::is_locked` and nowhere else.

pub mod status;

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{BillingMode, BillingProfile, CreateBillingProfile, SubscriptionIdentifiers, User};

pub use status::{is_locked, normalize, PaymentStatus};

/// Snapshot of provider-side subscription state carried by a reconciliation
/// path. `raw_status` is the provider's wording; everything else is optional
/// because different events learn different subsets.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSnapshot {
    pub raw_status: String,
    pub identifiers: SubscriptionIdentifiers,
}

/// Apply provider-side subscription state to an athlete.
///
/// Creates the billing profile if it does not exist yet (webhook arriving
/// before the eager creation, or external onboarding), otherwise updates it.
/// The user mirror is written in the same transaction. Returns the normalized
/// status and lock flag.
pub fn apply_subscription_state(
    conn: &mut Connection,
    athlete_id: &str,
    coach_id: &str,
    snapshot: &SubscriptionSnapshot,
) -> Result<(PaymentStatus, bool)> {
    let new_status = status::normalize(&snapshot.raw_status);
    let locked = status::is_locked(new_status);

    let tx = conn.transaction()?;

    match queries::get_billing_profile_by_athlete(&tx, athlete_id)? {
        Some(profile) => {
            queries::update_billing_profile_state(
                &tx,
                &profile.id,
                &snapshot.identifiers,
                new_status,
                locked,
            )?;
        }
        None => {
            let ids = &snapshot.identifiers;
            queries::create_billing_profile(
                &tx,
                &CreateBillingProfile {
                    athlete_id: athlete_id.to_string(),
                    coach_id: coach_id.to_string(),
                    stripe_customer_id: ids.stripe_customer_id.clone(),
                    stripe_subscription_id: ids.stripe_subscription_id.clone(),
                    stripe_subscription_item_id: ids.stripe_subscription_item_id.clone(),
                    stripe_price_id: ids.stripe_price_id.clone(),
                    amount_cents: ids.amount_cents.unwrap_or(0),
                    currency: ids.currency.clone().unwrap_or_else(|| "usd".to_string()),
                    payment_status: new_status,
                    locked,
                },
            )?;
        }
    }

    queries::set_user_billing_state(&tx, athlete_id, new_status, locked)?;
    tx.commit()?;

    Ok((new_status, locked))
}

/// Apply a status to an already-resolved profile (webhook paths that looked
/// the profile up by subscription or customer id).
pub fn apply_status_to_profile(
    conn: &mut Connection,
    profile: &BillingProfile,
    identifiers: &SubscriptionIdentifiers,
    raw_status: &str,
) -> Result<(PaymentStatus, bool)> {
    let new_status = status::normalize(raw_status);
    let locked = status::is_locked(new_status);
    write_profile_and_user(conn, profile, identifiers, new_status, locked)?;
    Ok((new_status, locked))
}

/// Force an explicit application-level status on a profile, bypassing the
/// normalizer. Used for `customer.subscription.deleted` (always `canceled`)
/// and invoice outcomes (`active`/`past_due`).
pub fn force_status_on_profile(
    conn: &mut Connection,
    profile: &BillingProfile,
    new_status: PaymentStatus,
) -> Result<(PaymentStatus, bool)> {
    let locked = status::is_locked(new_status);
    write_profile_and_user(
        conn,
        profile,
        &SubscriptionIdentifiers::default(),
        new_status,
        locked,
    )?;
    Ok((new_status, locked))
}

fn write_profile_and_user(
    conn: &mut Connection,
    profile: &BillingProfile,
    identifiers: &SubscriptionIdentifiers,
    new_status: PaymentStatus,
    locked: bool,
) -> Result<()> {
    let tx = conn.transaction()?;
    queries::update_billing_profile_state(&tx, &profile.id, identifiers, new_status, locked)?;
    queries::set_user_billing_state(&tx, &profile.athlete_id, new_status, locked)?;
    tx.commit()?;
    Ok(())
}

/// The access-gate predicate, shared by the check-in endpoint and the
/// client-facing user projection. An athlete is restricted when their mirror
/// is locked or their status sits in the restricted set.
pub fn access_restricted(locked: bool, payment_status: PaymentStatus) -> bool {
    locked
        || matches!(
            payment_status,
            PaymentStatus::Incomplete
                | PaymentStatus::PastDue
                | PaymentStatus::Canceled
                | PaymentStatus::WaitingForCoach
        )
}

/// Gate for check-in submission. The first check-in is always allowed: it
/// establishes the baseline before billing starts.
pub fn submission_allowed(prior_checkins: i64, locked: bool, payment_status: PaymentStatus) -> bool {
    prior_checkins == 0 || !access_restricted(locked, payment_status)
}

/// Lifecycle trigger: flip a fresh athlete out of `trial` right after their
/// first accepted check-in. Platform-billed coaches start the Stripe clock
/// (`incomplete` + locked until checkout completes); externally-billed
/// coaches park the athlete in `waiting_for_coach` (also locked).
///
/// This is the sole mechanism that starts the billing clock. No-op when the
/// athlete already left `trial`.
pub fn start_billing_clock(conn: &mut Connection, athlete: &User) -> Result<(PaymentStatus, bool)> {
    if athlete.payment_status != PaymentStatus::Trial {
        return Ok((athlete.payment_status, athlete.locked));
    }

    let coach_id = athlete
        .coach_id
        .as_deref()
        .ok_or_else(|| AppError::Internal(format!("athlete {} has no coach", athlete.id)))?;
    let coach = queries::get_user_by_id(conn, coach_id)?
        .ok_or_else(|| AppError::Internal(format!("coach {} not found", coach_id)))?;

    let new_status = match coach.billing_mode {
        Some(BillingMode::External) => PaymentStatus::WaitingForCoach,
        // Platform is the default when a coach never chose a mode
        _ => PaymentStatus::Incomplete,
    };
    // waiting_for_coach is outside the normalizer's lock set but still
    // restricts access; both branches lock explicitly
    let locked = true;

    let tx = conn.transaction()?;
    if let Some(profile) = queries::get_billing_profile_by_athlete(&tx, &athlete.id)? {
        queries::update_billing_profile_state(
            &tx,
            &profile.id,
            &SubscriptionIdentifiers::default(),
            new_status,
            locked,
        )?;
    }
    queries::set_user_billing_state(&tx, &athlete.id, new_status, locked)?;
    tx.commit()?;

    tracing::info!(
        "billing clock started: athlete={}, status={}, coach_mode={:?}",
        athlete.id,
        new_status,
        coach.billing_mode
    );

    Ok((new_status, locked))
}
