pub mod athletes;
pub mod billing;
pub mod checkins;
pub mod me;
pub mod webhooks;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::db::AppState;
use crate::middleware::require_auth;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/me", get(me::get_me).patch(me::update_me))
        .route("/api/me/payments", get(me::my_payments))
        .route(
            "/api/checkins",
            post(checkins::create_checkin).get(checkins::list_checkins),
        )
        .route(
            "/api/athletes",
            post(athletes::create_athlete).get(athletes::list_athletes),
        )
        .route("/api/billing/checkout", post(billing::create_checkout))
        .route("/api/billing/portal", post(billing::create_portal))
        .route("/api/billing/confirm", post(billing::confirm_checkout))
        .route(
            "/api/billing/athletes/{athlete_id}/price",
            post(billing::update_athlete_price),
        )
        .route("/api/billing/summary", get(billing::coach_summary))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // Webhook verifies its own HMAC signature; health is open
    let public = Router::new()
        .route("/api/stripe/webhook", post(webhooks::handle_stripe_webhook))
        .route("/health", get(health));

    public.merge(protected).with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
