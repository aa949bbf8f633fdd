use serde::{Deserialize, Serialize};

/// Outcome of a single Stripe invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only ledger row, one per Stripe invoice. `stripe_invoice_id` is
/// UNIQUE so webhook re-delivery upserts instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub athlete_id: String,
    pub coach_id: String,
    pub stripe_invoice_id: String,
    pub stripe_charge_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentOutcome,
    pub invoice_url: Option<String>,
    pub invoice_pdf_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct UpsertPayment {
    pub athlete_id: String,
    pub coach_id: String,
    pub stripe_invoice_id: String,
    pub stripe_charge_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentOutcome,
    pub invoice_url: Option<String>,
    pub invoice_pdf_url: Option<String>,
}
