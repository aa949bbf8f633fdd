use serde::Serialize;

use crate::billing::status::PaymentStatus;

/// Per-athlete billing projection for the coach dashboard.
///
/// Athletes with no billing profile yet have null billing fields; athletes
/// with no paid invoices have null `last_paid_at`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AthleteBillingView {
    pub athlete_id: String,
    pub name: String,
    pub email: String,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub locked: Option<bool>,
    pub last_paid_at: Option<i64>,
}

/// Aggregated billing view for a coach.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachBillingSummary {
    /// Sum of all paid invoice amounts across this coach's athletes
    pub total_revenue_cents: i64,
    /// Sum of current amounts on profiles with status = active
    pub mrr_cents: i64,
    pub athletes: Vec<AthleteBillingView>,
}
