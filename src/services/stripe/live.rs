use std::collections::HashMap;

use async_trait::async_trait;

use super::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CheckoutSessionDetails, CustomerInfo,
    CreateCheckoutSessionRequest, PriceInfo, ProductInfo, StripeService, StripeServiceError,
    SubscriptionInfo,
};

pub struct LiveStripeService {
    client: stripe::Client,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }
}

fn map_mode(mode: CheckoutMode) -> stripe::CheckoutSessionMode {
    match mode {
        CheckoutMode::Payment => stripe::CheckoutSessionMode::Payment,
        CheckoutMode::Subscription => stripe::CheckoutSessionMode::Subscription,
        CheckoutMode::Setup => stripe::CheckoutSessionMode::Setup,
    }
}

fn map_line_items(items: &[CheckoutLineItem]) -> Vec<stripe::CreateCheckoutSessionLineItems> {
    items
        .iter()
        .map(|li| stripe::CreateCheckoutSessionLineItems {
            price: Some(li.price.clone()),
            quantity: Some(li.quantity),
            ..Default::default()
        })
        .collect()
}

fn map_subscription(sub: &stripe::Subscription) -> SubscriptionInfo {
    let price_id = sub
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref())
        .map(|p| p.id.to_string());
    SubscriptionInfo {
        id: sub.id.to_string(),
        status: sub.status.to_string(),
        price_id,
        current_period_start: sub.current_period_start,
        current_period_end: sub.current_period_end,
        created: sub.created,
        cancel_at_period_end: sub.cancel_at_period_end,
    }
}

fn map_price(price: &stripe::Price) -> PriceInfo {
    PriceInfo {
        id: price.id.to_string(),
        nickname: price.nickname.clone(),
        unit_amount: price.unit_amount,
        currency: price.currency.map(|c| c.to_string()).unwrap_or_default(),
        interval: price
            .recurring
            .as_ref()
            .map(|r| r.interval.to_string())
            .unwrap_or_default(),
        created: price.created.unwrap_or_default(),
    }
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<CustomerInfo, StripeServiceError> {
        let mut params = stripe::CreateCustomer::new();
        params.email = Some(email);
        if let Some(name) = name {
            params.name = Some(name);
        }
        let customer = stripe::Customer::create(&self.client, params).await?;
        Ok(CustomerInfo {
            id: customer.id.to_string(),
            email: customer.email.clone(),
            name: customer.name.clone(),
        })
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let cid = customer_id
            .parse::<stripe::CustomerId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let mut params = stripe::CreateSubscription::new(cid);
        params.items = Some(vec![stripe::CreateSubscriptionItems {
            price: Some(price_id.to_string()),
            quantity: Some(1),
            ..Default::default()
        }]);
        let sub = stripe::Subscription::create(&self.client, params).await?;
        Ok(map_subscription(&sub))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<(), StripeServiceError> {
        let sub_id = subscription_id
            .parse::<stripe::SubscriptionId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        stripe::Subscription::cancel(&self.client, &sub_id, Default::default()).await?;
        Ok(())
    }

    async fn latest_subscription_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionInfo>, StripeServiceError> {
        let cust_id = customer_id
            .parse::<stripe::CustomerId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;

        let mut list_params = stripe::ListSubscriptions::new();
        list_params.customer = Some(cust_id);
        list_params.status = Some(stripe::SubscriptionStatusFilter::All);
        list_params.limit = Some(10);

        let subs = stripe::Subscription::list(&self.client, &list_params).await?;
        let latest = subs.data.iter().max_by_key(|s| s.created);
        Ok(latest.map(map_subscription))
    }

    async fn list_products_with_prices(&self) -> Result<Vec<ProductInfo>, StripeServiceError> {
        let mut product_params = stripe::ListProducts::new();
        product_params.active = Some(true);
        product_params.limit = Some(100);
        let products = stripe::Product::list(&self.client, &product_params).await?;

        let mut price_params = stripe::ListPrices::new();
        price_params.active = Some(true);
        price_params.limit = Some(100);
        let prices = stripe::Price::list(&self.client, &price_params).await?;

        // Group recurring prices by product id, oldest first.
        let mut by_product: HashMap<String, Vec<PriceInfo>> = HashMap::new();
        for price in prices.data.iter().filter(|p| p.recurring.is_some()) {
            if let Some(product) = price.product.as_ref() {
                by_product
                    .entry(product.id().to_string())
                    .or_default()
                    .push(map_price(price));
            }
        }
        for prices in by_product.values_mut() {
            prices.sort_by_key(|p| p.created);
        }

        Ok(products
            .data
            .into_iter()
            .map(|prod| {
                let id = prod.id.to_string();
                let prices = by_product.remove(&id).unwrap_or_default();
                ProductInfo {
                    id,
                    name: prod.name.clone().unwrap_or_default(),
                    description: prod.description.clone(),
                    active: prod.active.unwrap_or(false),
                    prices,
                }
            })
            .collect())
    }

    async fn get_price(&self, price_id: &str) -> Result<PriceInfo, StripeServiceError> {
        let pid = price_id
            .parse::<stripe::PriceId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let price = stripe::Price::retrieve(&self.client, &pid, &[]).await?;
        Ok(map_price(&price))
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(map_mode(req.mode));
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        if let Some(ref id) = req.client_reference_id {
            params.client_reference_id = Some(id);
        }
        if let Some(ref customer) = req.customer {
            let cid = customer
                .parse::<stripe::CustomerId>()
                .map_err(|e| StripeServiceError::Other(e.to_string()))?;
            params.customer = Some(cid);
        }
        if let Some(ref meta) = req.metadata {
            let mut m = HashMap::new();
            for (k, v) in meta.iter() {
                m.insert(k.clone(), v.clone());
            }
            params.metadata = Some(m);
        }
        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items));
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, StripeServiceError> {
        let sid = session_id
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| StripeServiceError::Other(e.to_string()))?;
        let session = stripe::CheckoutSession::retrieve(&self.client, &sid, &[]).await?;
        let details = session.customer_details.as_ref();
        Ok(CheckoutSessionDetails {
            id: session.id.to_string(),
            url: session.url.clone(),
            customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
            customer_email: details.and_then(|d| d.email.clone()),
            customer_name: details.and_then(|d| d.name.clone()),
            subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
        })
    }
}
