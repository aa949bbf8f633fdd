//! Payment status vocabulary and normalization.
//!
//! Every write path (confirmation, webhooks, manual overrides) must go through
//! `normalize` and `is_locked` so the reduced vocabulary and the lock decision
//! can never diverge between call sites.

use serde::{Deserialize, Serialize};

/// Application payment status, reduced from Stripe's richer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Trial,
    Active,
    PastDue,
    Unpaid,
    Incomplete,
    Canceled,
    /// Coach bills outside the platform; set explicitly, never by `normalize`.
    WaitingForCoach,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::Canceled => "canceled",
            Self::WaitingForCoach => "waiting_for_coach",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(Self::Trial),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "unpaid" => Some(Self::Unpaid),
            "incomplete" => Some(Self::Incomplete),
            "canceled" => Some(Self::Canceled),
            "waiting_for_coach" => Some(Self::WaitingForCoach),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a raw Stripe subscription status onto the application vocabulary.
///
/// `trialing` and `active` both mean the athlete is in good standing;
/// `incomplete_expired` collapses into `incomplete`. Everything else passes
/// through verbatim. Raw statuses outside the vocabulary (Stripe adds new
/// ones occasionally) land on `Failed` rather than panicking or guessing.
pub fn normalize(raw_status: &str) -> PaymentStatus {
    match raw_status {
        "trialing" | "active" => PaymentStatus::Active,
        "incomplete_expired" => PaymentStatus::Incomplete,
        other => PaymentStatus::parse(other).unwrap_or(PaymentStatus::Failed),
    }
}

/// The lock decision. True iff the status means the athlete must not reach
/// gated functionality until billing is resolved.
pub fn is_locked(status: PaymentStatus) -> bool {
    matches!(
        status,
        PaymentStatus::PastDue
            | PaymentStatus::Unpaid
            | PaymentStatus::Incomplete
            | PaymentStatus::Canceled
    )
}
