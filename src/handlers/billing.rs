use axum::extract::State;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::billing::{self, PaymentStatus, SubscriptionSnapshot};
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AuthedUser;
use crate::models::{CoachBillingSummary, SafeUser, SubscriptionIdentifiers};
use crate::payments::StripeSubscription;

/// Minimum monthly fee: $1. Rejected before any provider call.
const MIN_FEE_CENTS: i64 = 100;

// ============ Checkout ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Override for the web client base URL embedded in redirect URLs
    #[serde(default)]
    pub app_base_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Athlete-initiated: create a subscription-mode checkout session and hand
/// back the hosted checkout URL.
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let athlete = auth.require_athlete()?;
    let coach_id = athlete
        .coach_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest(msg::COACH_NOT_FOUND.into()))?;

    let (coach, amount_cents) = {
        let conn = state.db.get()?;
        let coach = queries::get_user_by_id(&conn, coach_id)?.or_not_found(msg::COACH_NOT_FOUND)?;

        // Prefer the profile's current amount (a coach may have set a
        // per-athlete price), then the coach default, then the global default
        let profile_amount = queries::get_billing_profile_by_athlete(&conn, &athlete.id)?
            .map(|p| p.amount_cents)
            .filter(|a| *a > 0);
        let amount = profile_amount
            .or(coach.monthly_fee_cents)
            .unwrap_or(state.default_monthly_fee_cents);
        (coach, amount)
    };

    let base_url = request.app_base_url.as_deref().unwrap_or(&state.app_base_url);
    let success_url = format!(
        "{}/billing/confirm?session_id={{CHECKOUT_SESSION_ID}}",
        base_url
    );
    let cancel_url = format!("{}/billing/canceled", base_url);

    let session = state
        .stripe()?
        .create_checkout_session(
            &athlete.id,
            &coach.id,
            &athlete.email,
            amount_cents,
            &state.currency,
            &success_url,
            &cancel_url,
        )
        .await?;

    let checkout_url = session
        .url
        .ok_or_else(|| AppError::Internal("Checkout session has no URL".into()))?;

    Ok(Json(CheckoutResponse {
        checkout_url,
        session_id: session.id,
    }))
}

// ============ Billing portal ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalResponse {
    pub portal_url: String,
}

pub async fn create_portal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Result<Json<PortalResponse>> {
    let athlete = auth.require_athlete()?;

    let customer_id = {
        let conn = state.db.get()?;
        queries::get_billing_profile_by_athlete(&conn, &athlete.id)?
            .and_then(|p| p.stripe_customer_id)
            .or_not_found(msg::BILLING_PROFILE_NOT_FOUND)?
    };

    let return_url = format!("{}/billing", state.app_base_url);
    let portal = state
        .stripe()?
        .create_portal_session(&customer_id, &return_url)
        .await?;

    Ok(Json(PortalResponse {
        portal_url: portal.url,
    }))
}

// ============ Checkout confirmation ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub success: bool,
    pub payment_status: PaymentStatus,
    pub user: SafeUser,
}

/// Synchronous reconciliation invoked right after the checkout redirect.
///
/// Fetches the authoritative session + subscription state from Stripe and
/// applies it through the billing write path. Safe to retry: a repeat call
/// with the same completed session converges on the same end state. The
/// asynchronous webhook for the same checkout may land before or after this;
/// both read the provider's current truth, so order does not matter.
pub async fn confirm_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let athlete = auth.require_athlete()?.clone();
    if request.session_id.trim().is_empty() {
        return Err(AppError::BadRequest(msg::MISSING_SESSION_ID.into()));
    }

    let session = state
        .stripe()?
        .retrieve_checkout_session(request.session_id.trim())
        .await?;

    // Resolve the subscription snapshot. Prefer the expanded subscription's
    // status; fall back to deriving from the session's payment_status when
    // the subscription is not materialized yet.
    let subscription = match session.subscription.as_ref() {
        Some(sub_ref) => match sub_ref.as_object() {
            Some(sub) => Some(clone_subscription_fields(sub)),
            None => {
                let sub = state.stripe()?.retrieve_subscription(sub_ref.id()).await?;
                Some(clone_subscription_fields(&sub))
            }
        },
        None => None,
    };

    let raw_status = subscription
        .as_ref()
        .map(|s| s.raw_status.clone())
        .unwrap_or_else(|| {
            match session.payment_status.as_str() {
                "paid" | "no_payment_required" => "active".to_string(),
                _ => "incomplete".to_string(),
            }
        });

    let mut identifiers = subscription
        .map(|s| s.identifiers)
        .unwrap_or_default();
    if identifiers.stripe_customer_id.is_none() {
        identifiers.stripe_customer_id = session.customer.clone();
    }

    let coach_id = athlete
        .coach_id
        .clone()
        .ok_or_else(|| AppError::BadRequest(msg::COACH_NOT_FOUND.into()))?;

    let (payment_status, user) = {
        let mut conn = state.db.get()?;
        let (payment_status, _) = billing::apply_subscription_state(
            &mut conn,
            &athlete.id,
            &coach_id,
            &SubscriptionSnapshot {
                raw_status,
                identifiers,
            },
        )?;
        let user = queries::get_user_by_id(&conn, &athlete.id)?.or_not_found(msg::USER_NOT_FOUND)?;
        (payment_status, user)
    };

    tracing::info!(
        "checkout confirmed: athlete={}, session={}, status={}",
        athlete.id,
        request.session_id,
        payment_status
    );

    Ok(Json(ConfirmResponse {
        success: true,
        payment_status,
        user: SafeUser::from_user(&user),
    }))
}

struct SubscriptionFields {
    raw_status: String,
    identifiers: SubscriptionIdentifiers,
}

fn clone_subscription_fields(sub: &StripeSubscription) -> SubscriptionFields {
    let item = sub.first_item();
    SubscriptionFields {
        raw_status: sub.status.clone(),
        identifiers: SubscriptionIdentifiers {
            stripe_customer_id: sub.customer.clone(),
            stripe_subscription_id: Some(sub.id.clone()),
            stripe_subscription_item_id: item.map(|i| i.id.clone()),
            stripe_price_id: item.map(|i| i.price.id.clone()),
            amount_cents: item.and_then(|i| i.price.unit_amount),
            currency: item.and_then(|i| i.price.currency.clone()),
        },
    }
}

// ============ Price update ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePriceRequest {
    pub monthly_fee_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePriceResponse {
    pub success: bool,
    pub amount_cents: i64,
    pub price_id: String,
}

/// Coach-initiated: change an athlete's monthly fee. Creates a new Stripe
/// price on the subscription's product and swaps it in without proration.
pub async fn update_athlete_price(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Path(athlete_id): Path<String>,
    Json(request): Json<UpdatePriceRequest>,
) -> Result<Json<UpdatePriceResponse>> {
    let coach = auth.require_coach()?;
    if request.monthly_fee_cents < MIN_FEE_CENTS {
        return Err(AppError::BadRequest(msg::FEE_BELOW_MINIMUM.into()));
    }

    let profile = {
        let conn = state.db.get()?;
        queries::get_owned_athlete(&conn, &coach.id, &athlete_id)?
            .ok_or_else(|| AppError::Forbidden(msg::NOT_YOUR_ATHLETE.into()))?;
        queries::get_billing_profile_by_athlete(&conn, &athlete_id)?
            .or_not_found(msg::BILLING_PROFILE_NOT_FOUND)?
    };

    let subscription_id = profile
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_ITEM_MISSING.into()))?;

    let stripe = state.stripe()?;
    let subscription = stripe.retrieve_subscription(subscription_id).await?;
    let item = subscription
        .first_item()
        .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_ITEM_MISSING.into()))?;
    let product_id = item
        .price
        .product
        .as_deref()
        .ok_or_else(|| AppError::NotFound(msg::SUBSCRIPTION_ITEM_MISSING.into()))?;

    let new_price = stripe
        .create_price(product_id, request.monthly_fee_cents, &state.currency)
        .await?;
    stripe
        .update_subscription_price(&subscription.id, &item.id, &new_price.id)
        .await?;

    {
        let conn = state.db.get()?;
        queries::update_billing_profile_price(
            &conn,
            &profile.id,
            &new_price.id,
            request.monthly_fee_cents,
        )?;
    }

    tracing::info!(
        "price updated: coach={}, athlete={}, amount_cents={}",
        coach.id,
        athlete_id,
        request.monthly_fee_cents
    );

    Ok(Json(UpdatePriceResponse {
        success: true,
        amount_cents: request.monthly_fee_cents,
        price_id: new_price.id,
    }))
}

// ============ Coach summary ============

pub async fn coach_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Result<Json<CoachBillingSummary>> {
    let coach = auth.require_coach()?;
    let conn = state.db.get()?;

    let total_revenue_cents = queries::coach_total_revenue_cents(&conn, &coach.id)?;
    let mrr_cents = queries::coach_mrr_cents(&conn, &coach.id)?;
    let athletes = queries::coach_athlete_billing_views(&conn, &coach.id)?;

    Ok(Json(CoachBillingSummary {
        total_revenue_cents,
        mrr_cents,
        athletes,
    }))
}
