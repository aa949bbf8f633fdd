mod schema;
pub mod from_row;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and external clients.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Stripe API client; None when Stripe is not configured (dev setups,
    /// external-billing-only deployments)
    pub stripe: Option<StripeClient>,
    /// Base URL of the web client, for checkout redirect URLs
    pub app_base_url: String,
    /// Default monthly fee for platform-billed athletes (minor units)
    pub default_monthly_fee_cents: i64,
    pub currency: String,
}

impl AppState {
    pub fn stripe(&self) -> crate::error::Result<&StripeClient> {
        self.stripe
            .as_ref()
            .ok_or_else(|| crate::error::AppError::BadRequest(crate::error::msg::STRIPE_NOT_CONFIGURED.into()))
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
