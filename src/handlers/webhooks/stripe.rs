//! Stripe webhook ingestion.
//!
//! Contract with the provider: 400 means "the request itself was bad"
//! (signature failure, unparseable payload) and Stripe will retry; 200 means
//! "received", including events we recognize but cannot act on (no matching
//! billing profile, missing metadata) - those are logged and skipped so a
//! stale delivery can never wedge the retry queue. 500 is reserved for our
//! own failures (database errors, provider lookups), where a retry can help.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use crate::billing::{self, PaymentStatus, SubscriptionSnapshot};
use crate::db::{queries, AppState};
use crate::error::AppError;
use crate::models::{PaymentOutcome, SubscriptionIdentifiers, UpsertPayment};
use crate::payments::{CheckoutSession, StripeInvoice, StripeSubscription, StripeWebhookEvent};

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = match headers.get("stripe-signature").and_then(|v| v.to_str().ok()) {
        Some(sig) => sig,
        None => return (StatusCode::BAD_REQUEST, "Missing signature header"),
    };

    let stripe = match state.stripe.as_ref() {
        Some(client) => client,
        None => {
            tracing::error!("Stripe webhook received but no webhook secret is configured");
            return (StatusCode::BAD_REQUEST, "Webhooks not configured");
        }
    };

    match stripe.verify_webhook_signature(&body, signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "Invalid signature"),
        Err(e) => {
            tracing::warn!("Stripe webhook signature rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Stripe webhook payload unparseable: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };

    tracing::debug!("Stripe webhook received: {}", event.event_type);

    match process_event(&state, &event).await {
        Ok(outcome) => (StatusCode::OK, outcome),
        Err(e) => {
            tracing::error!(
                "Stripe webhook processing failed: type={}, error={}",
                event.event_type,
                e
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Processing failed")
        }
    }
}

async fn process_event(
    state: &AppState,
    event: &StripeWebhookEvent,
) -> crate::error::Result<&'static str> {
    match event.event_type.as_str() {
        "checkout.session.completed" => checkout_completed(state, &event.data.object).await,
        "customer.subscription.updated" => subscription_updated(state, &event.data.object),
        "customer.subscription.deleted" => subscription_deleted(state, &event.data.object),
        "invoice.payment_succeeded" => {
            invoice_outcome(state, &event.data.object, PaymentOutcome::Paid)
        }
        "invoice.payment_failed" => {
            invoice_outcome(state, &event.data.object, PaymentOutcome::Failed)
        }
        _ => Ok("Event ignored"),
    }
}

/// A checkout finished. The session metadata carries our athlete and coach
/// ids; the subscription is only an id in webhook payloads, so fetch it for
/// the authoritative status before applying state.
async fn checkout_completed(
    state: &AppState,
    object: &serde_json::Value,
) -> crate::error::Result<&'static str> {
    let session: CheckoutSession = serde_json::from_value(object.clone())
        .map_err(|e| AppError::Internal(format!("Bad checkout.session object: {}", e)))?;

    let (athlete_id, coach_id) = match (
        session.metadata.athlete_id.as_deref(),
        session.metadata.coach_id.as_deref(),
    ) {
        (Some(a), Some(c)) => (a, c),
        _ => {
            tracing::warn!(
                "checkout.session.completed without athlete/coach metadata: session={}",
                session.id
            );
            return Ok("Missing metadata - skipped");
        }
    };

    let subscription_id = match session.subscription.as_ref() {
        Some(sub_ref) => sub_ref.id().to_string(),
        None => {
            tracing::warn!(
                "checkout.session.completed without a subscription: session={}",
                session.id
            );
            return Ok("No subscription - skipped");
        }
    };

    let subscription = state.stripe()?.retrieve_subscription(&subscription_id).await?;
    let item = subscription.first_item();

    let snapshot = SubscriptionSnapshot {
        raw_status: subscription.status.clone(),
        identifiers: SubscriptionIdentifiers {
            stripe_customer_id: subscription.customer.clone().or(session.customer),
            stripe_subscription_id: Some(subscription.id.clone()),
            stripe_subscription_item_id: item.map(|i| i.id.clone()),
            stripe_price_id: item.map(|i| i.price.id.clone()),
            amount_cents: item.and_then(|i| i.price.unit_amount),
            currency: item.and_then(|i| i.price.currency.clone()),
        },
    };

    let mut conn = state.db.get()?;
    let (status, locked) =
        billing::apply_subscription_state(&mut conn, athlete_id, coach_id, &snapshot)?;

    tracing::info!(
        "checkout completed: athlete={}, subscription={}, status={}, locked={}",
        athlete_id,
        subscription.id,
        status,
        locked
    );
    Ok("Checkout processed")
}

fn subscription_updated(
    state: &AppState,
    object: &serde_json::Value,
) -> crate::error::Result<&'static str> {
    let subscription: StripeSubscription = serde_json::from_value(object.clone())
        .map_err(|e| AppError::Internal(format!("Bad subscription object: {}", e)))?;

    let mut conn = state.db.get()?;
    let profile = match queries::get_billing_profile_by_subscription(&conn, &subscription.id)? {
        Some(profile) => profile,
        None => {
            tracing::warn!(
                "subscription.updated for unknown subscription: {}",
                subscription.id
            );
            return Ok("No billing profile - skipped");
        }
    };

    let item = subscription.first_item();
    let identifiers = SubscriptionIdentifiers {
        stripe_customer_id: subscription.customer.clone(),
        stripe_subscription_id: Some(subscription.id.clone()),
        stripe_subscription_item_id: item.map(|i| i.id.clone()),
        stripe_price_id: item.map(|i| i.price.id.clone()),
        amount_cents: item.and_then(|i| i.price.unit_amount),
        currency: item.and_then(|i| i.price.currency.clone()),
    };

    let (status, locked) =
        billing::apply_status_to_profile(&mut conn, &profile, &identifiers, &subscription.status)?;

    tracing::info!(
        "subscription updated: athlete={}, raw={}, status={}, locked={}",
        profile.athlete_id,
        subscription.status,
        status,
        locked
    );
    Ok("Subscription updated")
}

fn subscription_deleted(
    state: &AppState,
    object: &serde_json::Value,
) -> crate::error::Result<&'static str> {
    let subscription: StripeSubscription = serde_json::from_value(object.clone())
        .map_err(|e| AppError::Internal(format!("Bad subscription object: {}", e)))?;

    let mut conn = state.db.get()?;
    let profile = match queries::get_billing_profile_by_subscription(&conn, &subscription.id)? {
        Some(profile) => profile,
        None => {
            tracing::warn!(
                "subscription.deleted for unknown subscription: {}",
                subscription.id
            );
            return Ok("No billing profile - skipped");
        }
    };

    // Deletion maps to canceled regardless of the payload's own status field
    billing::force_status_on_profile(&mut conn, &profile, PaymentStatus::Canceled)?;

    tracing::info!("subscription deleted: athlete={}", profile.athlete_id);
    Ok("Subscription canceled")
}

/// Record an invoice outcome in the payments ledger, then reconcile the
/// profile status. The upsert is keyed on the invoice id, so a redelivered
/// event updates the existing row instead of inserting a duplicate.
fn invoice_outcome(
    state: &AppState,
    object: &serde_json::Value,
    outcome: PaymentOutcome,
) -> crate::error::Result<&'static str> {
    let invoice: StripeInvoice = serde_json::from_value(object.clone())
        .map_err(|e| AppError::Internal(format!("Bad invoice object: {}", e)))?;

    let mut conn = state.db.get()?;

    // Resolve the profile by subscription first, then by customer. Older
    // invoices can arrive without a subscription reference.
    let profile = match invoice.subscription.as_deref() {
        Some(sub_id) => queries::get_billing_profile_by_subscription(&conn, sub_id)?,
        None => None,
    };
    let profile = match profile {
        Some(p) => Some(p),
        None => match invoice.customer.as_deref() {
            Some(customer_id) => queries::get_billing_profile_by_customer(&conn, customer_id)?,
            None => None,
        },
    };

    let profile = match profile {
        Some(profile) => profile,
        None => {
            tracing::warn!(
                "invoice event for unknown subscription/customer: invoice={}",
                invoice.id
            );
            return Ok("No billing profile - skipped");
        }
    };

    let amount_cents = match outcome {
        PaymentOutcome::Paid => invoice.amount_paid.unwrap_or(0),
        PaymentOutcome::Failed => invoice.amount_due.unwrap_or(0),
    };

    queries::upsert_payment(
        &conn,
        &UpsertPayment {
            athlete_id: profile.athlete_id.clone(),
            coach_id: profile.coach_id.clone(),
            stripe_invoice_id: invoice.id.clone(),
            stripe_charge_id: invoice.charge.clone(),
            amount_cents,
            currency: invoice
                .currency
                .clone()
                .unwrap_or_else(|| "usd".to_string()),
            status: outcome,
            invoice_url: invoice.hosted_invoice_url.clone(),
            invoice_pdf_url: invoice.invoice_pdf.clone(),
        },
    )?;

    let status = match outcome {
        PaymentOutcome::Paid => PaymentStatus::Active,
        PaymentOutcome::Failed => PaymentStatus::PastDue,
    };
    billing::force_status_on_profile(&mut conn, &profile, status)?;

    tracing::info!(
        "invoice {}: athlete={}, invoice={}, amount_cents={}",
        outcome,
        profile.athlete_id,
        invoice.id,
        amount_cents
    );
    Ok("Invoice processed")
}
