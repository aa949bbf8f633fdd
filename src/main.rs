use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coachdesk::config::Config;
use coachdesk::crypto::generate_api_token;
use coachdesk::db::{self, queries, AppState};
use coachdesk::handlers;
use coachdesk::models::{BillingMode, CreateUser, Role};
use coachdesk::payments::StripeClient;

#[derive(Parser)]
#[command(name = "coachdesk", about = "Coaching check-in and billing server")]
struct Cli {
    /// Seed development users (prints their API tokens)
    #[arg(long)]
    seed: bool,
    /// Delete the database file on shutdown
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coachdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = db::create_pool(&config.database_path)?;
    {
        let conn = pool.get()?;
        db::init_db(&conn)?;
    }
    tracing::info!("database ready at {}", config.database_path);

    if cli.seed {
        if config.dev_mode {
            let conn = pool.get()?;
            seed_dev_data(&conn)?;
        } else {
            tracing::warn!("--seed ignored: set COACHDESK_ENV=dev to seed demo data");
        }
    }

    let stripe = match (&config.stripe_secret_key, &config.stripe_webhook_secret) {
        (Some(key), Some(secret)) => Some(StripeClient::new(key, secret)),
        (Some(key), None) => {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set; webhook deliveries will be rejected");
            Some(StripeClient::new(key, ""))
        }
        _ => {
            tracing::warn!("STRIPE_SECRET_KEY not set; billing endpoints are disabled");
            None
        }
    };

    let state = AppState {
        db: pool,
        stripe,
        app_base_url: config.app_base_url.clone(),
        default_monthly_fee_cents: config.default_monthly_fee_cents,
        currency: config.currency.clone(),
    };

    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!("listening on {}", config.addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if cli.ephemeral {
        tracing::info!("ephemeral mode: removing {}", config.database_path);
        if let Err(e) = std::fs::remove_file(&config.database_path) {
            tracing::warn!("could not remove database file: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}

/// Idempotent dev bootstrap: one platform-billed coach, one external-billing
/// coach, one athlete each. Skipped when any users exist.
fn seed_dev_data(conn: &rusqlite::Connection) -> coachdesk::error::Result<()> {
    if queries::count_users(conn)? > 0 {
        tracing::info!("seed skipped: users already exist");
        return Ok(());
    }

    let coach_token = generate_api_token();
    let coach = queries::create_user(
        conn,
        &CreateUser {
            email: "coach@example.com".to_string(),
            name: "Pat Coach".to_string(),
            role: Role::Coach,
            coach_id: None,
            billing_mode: Some(BillingMode::Platform),
            monthly_fee_cents: Some(20000),
        },
        &coach_token,
    )?;

    let athlete_token = generate_api_token();
    let athlete = queries::create_user(
        conn,
        &CreateUser {
            email: "athlete@example.com".to_string(),
            name: "Alex Athlete".to_string(),
            role: Role::Athlete,
            coach_id: Some(coach.id.clone()),
            billing_mode: None,
            monthly_fee_cents: None,
        },
        &athlete_token,
    )?;

    let ext_coach_token = generate_api_token();
    let ext_coach = queries::create_user(
        conn,
        &CreateUser {
            email: "coach-external@example.com".to_string(),
            name: "Sam Offline".to_string(),
            role: Role::Coach,
            coach_id: None,
            billing_mode: Some(BillingMode::External),
            monthly_fee_cents: None,
        },
        &ext_coach_token,
    )?;

    let ext_athlete_token = generate_api_token();
    let ext_athlete = queries::create_user(
        conn,
        &CreateUser {
            email: "athlete-external@example.com".to_string(),
            name: "Robin Runner".to_string(),
            role: Role::Athlete,
            coach_id: Some(ext_coach.id.clone()),
            billing_mode: None,
            monthly_fee_cents: None,
        },
        &ext_athlete_token,
    )?;

    tracing::info!("seeded coach {} token={}", coach.id, coach_token);
    tracing::info!("seeded athlete {} token={}", athlete.id, athlete_token);
    tracing::info!("seeded coach {} token={}", ext_coach.id, ext_coach_token);
    tracing::info!("seeded athlete {} token={}", ext_athlete.id, ext_athlete_token);

    Ok(())
}
