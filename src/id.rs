//! Prefixed ID generation for coachdesk entities.
//!
//! All IDs use a `cd_` brand prefix to guarantee collision avoidance with
//! Stripe's IDs (`cus_`, `sub_`, `si_`, `price_`, `in_`, etc.).
//!
//! Format: `cd_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["cd_usr_", "cd_bp_", "cd_pay_", "cd_chk_"];

/// Validate that a string is a valid coachdesk prefixed ID.
///
/// Cheap check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    BillingProfile,
    Payment,
    CheckIn,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "cd_usr",
            Self::BillingProfile => "cd_bp",
            Self::Payment => "cd_pay",
            Self::CheckIn => "cd_chk",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
