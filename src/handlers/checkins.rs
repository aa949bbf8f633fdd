use axum::extract::State;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::billing;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Query};
use crate::middleware::AuthedUser;
use crate::models::{CheckIn, CreateCheckIn, SafeUser};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckInResponse {
    pub check_in: CheckIn,
    /// Post-submission user state; the first check-in can flip the payment
    /// status, so the client needs the fresh projection
    pub user: SafeUser,
}

/// Submit a check-in.
///
/// The gate reads the user's denormalized billing mirror: a restricted
/// athlete is rejected with 403, except that the very first check-in is
/// always accepted. Accepting check-in #1 starts the billing clock.
pub async fn create_checkin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Json(input): Json<CreateCheckIn>,
) -> Result<Json<CreateCheckInResponse>> {
    let athlete_id = auth.require_athlete()?.id.clone();

    let mut conn = state.db.get()?;

    // Re-read the mirror rather than trusting the row captured at auth time;
    // a webhook may have landed since.
    let athlete = queries::get_user_by_id(&conn, &athlete_id)?.or_not_found(msg::USER_NOT_FOUND)?;
    let prior = queries::count_checkins_for_athlete(&conn, &athlete_id)?;

    if !billing::submission_allowed(prior, athlete.locked, athlete.payment_status) {
        return Err(AppError::Forbidden(msg::SUBMISSIONS_LOCKED.into()));
    }

    let check_in = queries::create_checkin(&conn, &athlete_id, &input)?;

    if prior == 0 {
        billing::start_billing_clock(&mut conn, &athlete)?;
    }

    let user = queries::get_user_by_id(&conn, &athlete_id)?.or_not_found(msg::USER_NOT_FOUND)?;

    Ok(Json(CreateCheckInResponse {
        check_in,
        user: SafeUser::from_user(&user),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCheckInsQuery {
    /// Coaches pass this to read an athlete's history; athletes omit it
    #[serde(default)]
    pub athlete_id: Option<String>,
}

pub async fn list_checkins(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthedUser>,
    Query(query): Query<ListCheckInsQuery>,
) -> Result<Json<Vec<CheckIn>>> {
    let conn = state.db.get()?;

    let athlete_id = match query.athlete_id {
        Some(requested) => {
            let coach = auth.require_coach()?;
            queries::get_owned_athlete(&conn, &coach.id, &requested)?
                .ok_or_else(|| AppError::Forbidden(msg::NOT_YOUR_ATHLETE.into()))?;
            requested
        }
        None => auth.require_athlete()?.id.clone(),
    };

    let checkins = queries::list_checkins_for_athlete(&conn, &athlete_id)?;
    Ok(Json(checkins))
}
