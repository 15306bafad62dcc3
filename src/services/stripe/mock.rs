use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::{
    CheckoutSession, CheckoutSessionDetails, CustomerInfo, CreateCheckoutSessionRequest,
    PriceInfo, ProductInfo, StripeService, StripeServiceError, SubscriptionInfo,
};

/// Scripted Stripe backend for tests and local development. Captures calls
/// and returns either synthesized answers or configured failures.
#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_customers: Arc<Mutex<Vec<CustomerInfo>>>,
    pub created_subscriptions: Arc<Mutex<Vec<SubscriptionInfo>>>,
    pub cancel_calls: Arc<Mutex<Vec<String>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub remote_subscription: Arc<Mutex<Option<SubscriptionInfo>>>,
    pub prices: Arc<Mutex<BTreeMap<String, PriceInfo>>>,
    pub products: Arc<Mutex<Vec<ProductInfo>>>,
    pub sessions: Arc<Mutex<Vec<CheckoutSessionDetails>>>,
    pub fail_cancel: Arc<Mutex<bool>>,
    pub fail_prices: Arc<Mutex<bool>>,
    pub omit_session_url: Arc<Mutex<bool>>,
}

fn make_id(prefix: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{}_{}", prefix, ts)
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every cancel attempt fail with an API error.
    pub fn failing_cancels(self) -> Self {
        *self.fail_cancel.lock().unwrap() = true;
        self
    }

    /// Makes created checkout sessions come back without a redirect URL.
    pub fn missing_session_urls(self) -> Self {
        *self.omit_session_url.lock().unwrap() = true;
        self
    }

    /// Makes price lookups fail, for exercising graceful plan degradation.
    pub fn failing_prices(self) -> Self {
        *self.fail_prices.lock().unwrap() = true;
        self
    }

    /// Scripts the answer to `latest_subscription_for_customer`.
    pub fn with_remote_subscription(self, sub: SubscriptionInfo) -> Self {
        *self.remote_subscription.lock().unwrap() = Some(sub);
        self
    }

    pub fn with_price(self, price: PriceInfo) -> Self {
        self.prices
            .lock()
            .unwrap()
            .insert(price.id.clone(), price);
        self
    }

    pub fn with_session(self, session: CheckoutSessionDetails) -> Self {
        self.sessions.lock().unwrap().push(session);
        self
    }
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<CustomerInfo, StripeServiceError> {
        let customer = CustomerInfo {
            id: make_id("cus_test"),
            email: Some(email.to_string()),
            name: name.map(|n| n.to_string()),
        };
        self.created_customers.lock().unwrap().push(customer.clone());
        Ok(customer)
    }

    async fn create_subscription(
        &self,
        _customer_id: &str,
        price_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let sub = SubscriptionInfo {
            id: make_id("sub_test"),
            status: "active".into(),
            price_id: Some(price_id.to_string()),
            current_period_start: now,
            current_period_end: now + 30 * 24 * 3600,
            created: now,
            cancel_at_period_end: false,
        };
        self.created_subscriptions.lock().unwrap().push(sub.clone());
        Ok(sub)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<(), StripeServiceError> {
        self.cancel_calls
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        if *self.fail_cancel.lock().unwrap() {
            return Err(StripeServiceError::Api("cancel refused".into()));
        }
        Ok(())
    }

    async fn latest_subscription_for_customer(
        &self,
        _customer_id: &str,
    ) -> Result<Option<SubscriptionInfo>, StripeServiceError> {
        Ok(self.remote_subscription.lock().unwrap().clone())
    }

    async fn list_products_with_prices(&self) -> Result<Vec<ProductInfo>, StripeServiceError> {
        Ok(self.products.lock().unwrap().clone())
    }

    async fn get_price(&self, price_id: &str) -> Result<PriceInfo, StripeServiceError> {
        if *self.fail_prices.lock().unwrap() {
            return Err(StripeServiceError::Api("price lookup refused".into()));
        }
        self.prices
            .lock()
            .unwrap()
            .get(price_id)
            .cloned()
            .ok_or_else(|| StripeServiceError::NotFound(format!("price {price_id}")))
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.last_create_requests.lock().unwrap().push(req);
        let url = if *self.omit_session_url.lock().unwrap() {
            None
        } else {
            Some("https://example.test/checkout".into())
        };
        Ok(CheckoutSession {
            id: make_id("cs_test"),
            url,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, StripeServiceError> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| StripeServiceError::NotFound(format!("session {session_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CheckoutLineItem, CheckoutMode};
    use super::*;

    #[tokio::test]
    async fn mock_captures_checkout_request_and_returns_url() {
        let mock = MockStripeService::new();
        let req = CreateCheckoutSessionRequest {
            success_url: "https://example.test/success".into(),
            cancel_url: "https://example.test/cancel".into(),
            mode: CheckoutMode::Subscription,
            line_items: vec![CheckoutLineItem {
                price: "price_123".into(),
                quantity: 1,
            }],
            customer: Some("cus_test_123".into()),
            client_reference_id: None,
            metadata: None,
        };

        let session = mock.create_checkout_session(req.clone()).await.unwrap();
        assert!(session.id.starts_with("cs_test_"));
        assert_eq!(session.url.as_deref(), Some("https://example.test/checkout"));

        let captured = mock.last_create_requests.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].success_url, req.success_url);
        assert_eq!(captured[0].customer, req.customer);
        assert_eq!(captured[0].line_items.len(), 1);
        assert_eq!(captured[0].line_items[0].price, "price_123");
    }

    #[tokio::test]
    async fn failing_cancels_still_record_the_attempt() {
        let mock = MockStripeService::new().failing_cancels();
        let err = mock.cancel_subscription("sub_1").await.unwrap_err();
        assert!(matches!(err, StripeServiceError::Api(_)));
        assert_eq!(mock.cancel_calls.lock().unwrap().as_slice(), ["sub_1"]);
    }
}
