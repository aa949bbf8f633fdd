use axum::extract::State;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::billing::PaymentStatus;
use crate::crypto::generate_api_token;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::middleware::AuthedUser;
use crate::models::{BillingMode, CreateBillingProfile, CreateUser, Role, SafeUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAthleteRequest {
    pub email: String,
    pub name: String,
    /// Per-athlete override; falls back to the coach's default fee
    #[serde(default)]
    pub monthly_fee_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAthleteResponse {
    pub athlete: SafeUser,
    /// Shown once; only the hash is stored
    pub api_token: String,
}

/// Coach adds an athlete to their roster.
///
/// The athlete starts in `trial` and unlocked, so their first check-in goes
/// through. For platform-billed coaches a billing profile is created eagerly
/// in `incomplete`/locked so the checkout and webhook paths always find a row
/// to update; the user mirror stays `trial` until the lifecycle trigger fires.
pub async fn create_athlete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Json(request): Json<CreateAthleteRequest>,
) -> Result<Json<CreateAthleteResponse>> {
    let coach = auth.require_coach()?.clone();

    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }

    let conn = state.db.get()?;
    if queries::get_user_by_email(&conn, &email)?.is_some() {
        return Err(AppError::Conflict(msg::EMAIL_ALREADY_REGISTERED.into()));
    }

    let api_token = generate_api_token();
    let athlete = queries::create_user(
        &conn,
        &CreateUser {
            email,
            name: request.name.trim().to_string(),
            role: Role::Athlete,
            coach_id: Some(coach.id.clone()),
            billing_mode: None,
            monthly_fee_cents: None,
        },
        &api_token,
    )?;

    // Platform is the default mode for coaches that never picked one
    let platform_billed = coach.billing_mode != Some(BillingMode::External);
    if platform_billed {
        let amount_cents = request
            .monthly_fee_cents
            .or(coach.monthly_fee_cents)
            .unwrap_or(state.default_monthly_fee_cents);

        queries::create_billing_profile(
            &conn,
            &CreateBillingProfile {
                athlete_id: athlete.id.clone(),
                coach_id: coach.id.clone(),
                stripe_customer_id: None,
                stripe_subscription_id: None,
                stripe_subscription_item_id: None,
                stripe_price_id: None,
                amount_cents,
                currency: state.currency.clone(),
                payment_status: PaymentStatus::Incomplete,
                locked: true,
            },
        )?;
    }

    tracing::info!(
        "athlete created: coach={}, athlete={}, platform_billed={}",
        coach.id,
        athlete.id,
        platform_billed
    );

    Ok(Json(CreateAthleteResponse {
        athlete: SafeUser::from_user(&athlete),
        api_token,
    }))
}

pub async fn list_athletes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Result<Json<Vec<SafeUser>>> {
    let coach = auth.require_coach()?;
    let conn = state.db.get()?;
    let athletes = queries::list_athletes_for_coach(&conn, &coach.id)?;
    Ok(Json(athletes.iter().map(SafeUser::from_user).collect()))
}
