use serde::{Deserialize, Serialize};

use crate::billing::status::PaymentStatus;

/// One billing profile per billed athlete. Source of truth for payment
/// status; the athlete's `users` row mirrors `payment_status`/`locked` and is
/// written in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingProfile {
    pub id: String,
    pub athlete_id: String,
    pub coach_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    /// Subscription line item, needed for price swaps
    pub stripe_subscription_item_id: Option<String>,
    pub stripe_price_id: Option<String>,
    /// Current monthly amount in minor currency units
    pub amount_cents: i64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub locked: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateBillingProfile {
    pub athlete_id: String,
    pub coach_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_item_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub locked: bool,
}

/// Fields the reconciliation paths may update on an existing profile.
/// `None` leaves the stored value untouched; status/locked are always written.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionIdentifiers {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_subscription_item_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
}
