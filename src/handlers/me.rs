use axum::extract::State;
use axum::Extension;
use serde::Deserialize;

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::middleware::AuthedUser;
use crate::models::{Payment, SafeUser};

/// Current user, read fresh so a webhook that landed mid-session is visible.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Result<Json<SafeUser>> {
    let conn = state.db.get()?;
    let user = queries::get_user_by_id(&conn, &auth.0.id)?.or_not_found(msg::USER_NOT_FOUND)?;
    Ok(Json(SafeUser::from_user(&user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    /// Coaches only: default monthly fee for new athletes
    #[serde(default)]
    pub monthly_fee_cents: Option<i64>,
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Json(request): Json<UpdateMeRequest>,
) -> Result<Json<SafeUser>> {
    let conn = state.db.get()?;

    if let Some(fee) = request.monthly_fee_cents {
        let coach = auth.require_coach()?;
        if fee < 100 {
            return Err(AppError::BadRequest(msg::FEE_BELOW_MINIMUM.into()));
        }
        queries::set_coach_monthly_fee(&conn, &coach.id, fee)?;
    }

    let user = queries::get_user_by_id(&conn, &auth.0.id)?.or_not_found(msg::USER_NOT_FOUND)?;
    Ok(Json(SafeUser::from_user(&user)))
}

/// Athlete's own payment history, newest first.
pub async fn my_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
) -> Result<Json<Vec<Payment>>> {
    let athlete = auth.require_athlete()?;
    let conn = state.db.get()?;
    let payments = queries::list_payments_for_athlete(&conn, &athlete.id)?;
    Ok(Json(payments))
}
