mod stripe;

pub use stripe::{
    CheckoutSession, StripeClient, StripeInvoice, StripeSubscription, StripeWebhookEvent,
};
