use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{msg, AppError, Result};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(msg::CHECKOUT_SESSION_NOT_FOUND.into()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Create a subscription-mode checkout session for an athlete's monthly
    /// fee. The price is defined inline; athlete and coach ids travel in
    /// metadata so the completion webhook can resolve them.
    pub async fn create_checkout_session(
        &self,
        athlete_id: &str,
        coach_id: &str,
        athlete_email: &str,
        amount_cents: i64,
        currency: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("customer_email".to_string(), athlete_email.to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                currency.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                "Monthly coaching".to_string(),
            ),
            (
                "line_items[0][price_data][recurring][interval]".to_string(),
                "month".to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                amount_cents.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[athlete_id]".to_string(), athlete_id.to_string()),
            ("metadata[coach_id]".to_string(), coach_id.to_string()),
            (
                "subscription_data[metadata][athlete_id]".to_string(),
                athlete_id.to_string(),
            ),
            (
                "subscription_data[metadata][coach_id]".to_string(),
                coach_id.to_string(),
            ),
        ];

        self.post_form("/checkout/sessions", &form).await
    }

    /// Retrieve a checkout session with its subscription expanded, so the
    /// confirmation path sees the authoritative subscription status in one
    /// round trip.
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession> {
        self.get(
            &format!("/checkout/sessions/{}", session_id),
            &[("expand[]", "subscription")],
        )
        .await
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.get(&format!("/subscriptions/{}", subscription_id), &[])
            .await
    }

    /// Create a billing portal session for subscription self-management.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post_form("/billing_portal/sessions", &form).await
    }

    /// Create a new recurring monthly price on an existing product.
    pub async fn create_price(
        &self,
        product_id: &str,
        amount_cents: i64,
        currency: &str,
    ) -> Result<StripePrice> {
        let form = vec![
            ("product".to_string(), product_id.to_string()),
            ("unit_amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("recurring[interval]".to_string(), "month".to_string()),
        ];
        self.post_form("/prices", &form).await
    }

    /// Swap the price on a subscription's line item without proration.
    pub async fn update_subscription_price(
        &self,
        subscription_id: &str,
        subscription_item_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription> {
        let form = vec![
            ("items[0][id]".to_string(), subscription_item_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            ("proration_behavior".to_string(), "none".to_string()),
        ];
        self.post_form(&format!("/subscriptions/{}", subscription_id), &form)
            .await
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Verify a `Stripe-Signature` header against the raw request body.
    ///
    /// Returns Ok(false) on a well-formed but wrong signature or a stale
    /// timestamp; Err on a malformed header. Never trust event contents
    /// before this passes.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let parts: Vec<&str> = signature.split(',').collect();

        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in parts {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;

        // Reject stale timestamps to prevent replayed deliveries.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Clock skew tolerance for timestamps from the future: 60 seconds
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison; signature length is not secret (always
        // 64 hex chars for SHA-256) so the length check is fine.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

// ============ Wire types ============

/// Generic Stripe webhook event - object is parsed based on event_type.
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    /// "paid", "unpaid", or "no_payment_required"
    pub payment_status: String,
    pub customer: Option<String>,
    /// Plain id in webhook payloads; full object when retrieved with
    /// expand[]=subscription
    #[serde(default)]
    pub subscription: Option<SubscriptionRef>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

/// Stripe returns the subscription either as a bare id or an expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionRef {
    Id(String),
    Object(Box<StripeSubscription>),
}

impl SubscriptionRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(sub) => &sub.id,
        }
    }

    pub fn as_object(&self) -> Option<&StripeSubscription> {
        match self {
            Self::Id(_) => None,
            Self::Object(sub) => Some(sub),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionMetadata {
    pub athlete_id: Option<String>,
    pub coach_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    /// Raw provider status ("trialing", "active", "past_due", ...)
    pub status: String,
    pub customer: Option<String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    pub price: StripePrice,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub charge: Option<String>,
    pub amount_paid: Option<i64>,
    pub amount_due: Option<i64>,
    pub currency: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

impl StripeSubscription {
    /// First line item, if present. Single-item subscriptions are the only
    /// shape this app creates.
    pub fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.data.first()
    }
}
