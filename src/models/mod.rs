mod billing_profile;
mod checkin;
mod payment;
mod summary;
mod user;

pub use billing_profile::{BillingProfile, CreateBillingProfile, SubscriptionIdentifiers};
pub use checkin::{CheckIn, CreateCheckIn};
pub use payment::{Payment, PaymentOutcome, UpsertPayment};
pub use summary::{AthleteBillingView, CoachBillingSummary};
pub use user::{BillingMode, CreateUser, Role, SafeUser, User};
