use serde::{Deserialize, Serialize};

use crate::billing::status::PaymentStatus;

/// Account role. Coaches own athletes; athletes submit check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Athlete,
    Coach,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Athlete => "athlete",
            Self::Coach => "coach",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "athlete" => Some(Self::Athlete),
            "coach" => Some(Self::Coach),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a coach charges their athletes.
///
/// `Platform` coaches bill through Stripe subscriptions managed here;
/// `External` coaches invoice outside the app, so their athletes sit in
/// `waiting_for_coach` until the coach unlocks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    Platform,
    External,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::External => "external",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "platform" => Some(Self::Platform),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Athlete's coach (None for coaches)
    pub coach_id: Option<String>,
    /// Billing mode (coaches only)
    pub billing_mode: Option<BillingMode>,
    /// Default monthly fee in minor currency units (coaches only)
    pub monthly_fee_cents: Option<i64>,
    /// Denormalized mirror of the billing profile; kept in sync by the
    /// billing write path
    pub payment_status: PaymentStatus,
    pub locked: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Projection of a user safe to return to clients: no token material,
/// camelCase field names matching the web client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub coach_id: Option<String>,
    pub billing_mode: Option<BillingMode>,
    pub payment_status: PaymentStatus,
    pub locked: bool,
    /// The access-gate predicate, precomputed so the client route lockout
    /// and the server gate agree by construction
    pub access_locked: bool,
}

impl SafeUser {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            coach_id: user.coach_id.clone(),
            billing_mode: user.billing_mode,
            payment_status: user.payment_status,
            locked: user.locked,
            access_locked: crate::billing::access_restricted(user.locked, user.payment_status),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub coach_id: Option<String>,
    #[serde(default)]
    pub billing_mode: Option<BillingMode>,
    #[serde(default)]
    pub monthly_fee_cents: Option<i64>,
}
