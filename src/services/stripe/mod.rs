// NOTE: async-stripe is compiled with a minimal feature set
// (runtime-tokio-hyper, checkout, billing). Touching APIs outside those
// features requires updating Cargo.toml explicitly.
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StripeServiceError {
    #[error("stripe api error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("other error: {0}")]
    Other(String),
}

impl From<stripe::StripeError> for StripeServiceError {
    fn from(err: stripe::StripeError) -> Self {
        StripeServiceError::Api(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Payment,
    Subscription,
    Setup,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub mode: CheckoutMode,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer: Option<String>,
    pub client_reference_id: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// A completed (or in-flight) session as retrieved after the redirect,
/// carrying the customer identity needed to upsert the local user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSessionDetails {
    pub id: String,
    pub url: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub subscription_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: String,
    pub status: String,
    pub price_id: Option<String>,
    /// Unix timestamp (seconds) when the current period started
    pub current_period_start: i64,
    /// Unix timestamp (seconds) when the current period ends
    pub current_period_end: i64,
    /// Unix timestamp (seconds) when Stripe created the subscription
    pub created: i64,
    pub cancel_at_period_end: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceInfo {
    pub id: String,
    pub nickname: Option<String>,
    /// Minor currency units, e.g. cents.
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub interval: String,
    pub created: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub prices: Vec<PriceInfo>,
}

/// The payment processor, behind a trait so handlers and services never touch
/// the SDK directly and tests can script remote behavior.
#[async_trait]
pub trait StripeService: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<CustomerInfo, StripeServiceError>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError>;

    async fn cancel_subscription(&self, subscription_id: &str)
        -> Result<(), StripeServiceError>;

    /// Most recent subscription for the customer, any status.
    async fn latest_subscription_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionInfo>, StripeServiceError>;

    /// Active products with their active recurring prices.
    async fn list_products_with_prices(&self) -> Result<Vec<ProductInfo>, StripeServiceError>;

    async fn get_price(&self, price_id: &str) -> Result<PriceInfo, StripeServiceError>;

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, StripeServiceError>;
}

mod live;
mod mock;

pub use live::LiveStripeService;
pub use mock::MockStripeService;
