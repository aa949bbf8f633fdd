//! Bearer-token authentication.
//!
//! Token issuance (login flows) is handled outside this service; tokens are
//! seeded or provisioned out of band and looked up by SHA-256 hash.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::models::{Role, User};

/// The authenticated user, inserted into request extensions by
/// `require_auth` and read back via `Extension<AuthedUser>`.
#[derive(Clone)]
pub struct AuthedUser(pub User);

impl AuthedUser {
    pub fn require_athlete(&self) -> Result<&User> {
        if self.0.role == Role::Athlete {
            Ok(&self.0)
        } else {
            Err(AppError::Forbidden(msg::ATHLETES_ONLY.into()))
        }
    }

    pub fn require_coach(&self) -> Result<&User> {
        if self.0.role == Role::Coach {
            Ok(&self.0)
        } else {
            Err(AppError::Forbidden(msg::COACHES_ONLY.into()))
        }
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = queries::get_user_by_api_token(&conn, token)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(AuthedUser(user));

    Ok(next.run(request).await)
}
