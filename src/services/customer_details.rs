use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::user_repository::UserRepository;
use crate::db::StoreError;
use crate::models::subscription::Subscription;
use crate::models::user::User;

use super::stripe::{PriceInfo, StripeService, SubscriptionInfo};
use super::ServiceError;

/// Aggregated view of a customer: the local user row, their most recent
/// subscription, and the plan it is on.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub user: User,
    pub subscription: Option<Subscription>,
    pub plan: Option<PriceInfo>,
}

/// Read-side composition over the user store, subscription store and Stripe.
/// Never writes; missing pieces degrade to `None` instead of failing the
/// whole view.
pub struct CustomerDetailsService {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    stripe: Arc<dyn StripeService>,
}

impl CustomerDetailsService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        stripe: Arc<dyn StripeService>,
    ) -> Self {
        Self {
            users,
            subscriptions,
            stripe,
        }
    }

    pub async fn get_customer_details(
        &self,
        user_id: Uuid,
    ) -> Result<CustomerDetails, ServiceError> {
        let user = self.users.get_user_by_id(user_id).await?;

        let subscription = match self
            .subscriptions
            .get_latest_subscription_for_user(user_id)
            .await
        {
            Ok(sub) => Some(sub),
            Err(StoreError::NotFound(_)) => self.remote_fallback(&user).await,
            Err(err) => return Err(err.into()),
        };

        let plan = match subscription
            .as_ref()
            .map(|s| s.stripe_price_id.as_str())
            .filter(|p| !p.is_empty())
        {
            Some(price_id) => match self.stripe.get_price(price_id).await {
                Ok(price) => Some(price),
                Err(err) => {
                    warn!(%user_id, price_id, %err, "price lookup failed, omitting plan");
                    None
                }
            },
            None => None,
        };

        Ok(CustomerDetails {
            user,
            subscription,
            plan,
        })
    }

    /// The local store only sees subscriptions created through this service.
    /// If Stripe knows one we don't, project it into the local shape so the
    /// view stays complete.
    async fn remote_fallback(&self, user: &User) -> Option<Subscription> {
        let customer_id = user.stripe_customer_id.as_deref()?;
        match self
            .stripe
            .latest_subscription_for_customer(customer_id)
            .await
        {
            Ok(remote) => remote.map(|info| project_remote(user.id, info)),
            Err(err) => {
                warn!(user_id = %user.id, customer_id, %err, "remote subscription lookup failed");
                None
            }
        }
    }
}

fn project_remote(user_id: Uuid, info: SubscriptionInfo) -> Subscription {
    let created = OffsetDateTime::from_unix_timestamp(info.created)
        .unwrap_or_else(|_| OffsetDateTime::now_utc());
    Subscription {
        id: Uuid::new_v4(),
        user_id,
        stripe_subscription_id: Some(info.id),
        stripe_price_id: info.price_id.unwrap_or_default(),
        status: info.status,
        current_period_start: OffsetDateTime::from_unix_timestamp(info.current_period_start).ok(),
        current_period_end: OffsetDateTime::from_unix_timestamp(info.current_period_end).ok(),
        created_at: created,
        updated_at: created,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{InMemorySubscriptionRepository, InMemoryUserRepository};
    use crate::services::stripe::MockStripeService;

    fn service(stripe: MockStripeService) -> (Arc<InMemoryUserRepository>, Arc<InMemorySubscriptionRepository>, CustomerDetailsService) {
        let users = Arc::new(InMemoryUserRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let svc = CustomerDetailsService::new(
            users.clone(),
            subscriptions.clone(),
            Arc::new(stripe),
        );
        (users, subscriptions, svc)
    }

    fn price(id: &str) -> PriceInfo {
        PriceInfo {
            id: id.to_string(),
            nickname: Some("Pro".into()),
            unit_amount: Some(2000),
            currency: "usd".into(),
            interval: "month".into(),
            created: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (_, _, svc) = service(MockStripeService::new());
        let err = svc.get_customer_details(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn user_without_subscription_gets_empty_view() {
        let (users, _, svc) = service(MockStripeService::new());
        let user = User::new("ada@example.test", "Ada", None);
        users.create_user(&user).await.unwrap();

        let details = svc.get_customer_details(user.id).await.unwrap();
        assert_eq!(details.user.id, user.id);
        assert!(details.subscription.is_none());
        assert!(details.plan.is_none());
    }

    #[tokio::test]
    async fn local_subscription_wins_with_plan_resolved() {
        let stripe = MockStripeService::new().with_price(price("price_pro"));
        let (users, subscriptions, svc) = service(stripe);
        let user = User::new("ada@example.test", "Ada", Some("cus_ada".into()));
        users.create_user(&user).await.unwrap();
        let sub = Subscription::new(user.id, "price_pro");
        subscriptions.create_subscription(&sub).await.unwrap();

        let details = svc.get_customer_details(user.id).await.unwrap();
        let got = details.subscription.unwrap();
        assert_eq!(got.id, sub.id);
        assert_eq!(details.plan.unwrap().id, "price_pro");
    }

    #[tokio::test]
    async fn falls_back_to_remote_subscription() {
        let remote = SubscriptionInfo {
            id: "sub_remote".into(),
            status: "active".into(),
            price_id: Some("price_pro".into()),
            current_period_start: 1_700_000_000,
            current_period_end: 1_702_592_000,
            created: 1_700_000_000,
            cancel_at_period_end: false,
        };
        let stripe = MockStripeService::new()
            .with_remote_subscription(remote)
            .with_price(price("price_pro"));
        let (users, _, svc) = service(stripe);
        let user = User::new("ada@example.test", "Ada", Some("cus_ada".into()));
        users.create_user(&user).await.unwrap();

        let details = svc.get_customer_details(user.id).await.unwrap();
        let got = details.subscription.unwrap();
        assert_eq!(got.stripe_subscription_id.as_deref(), Some("sub_remote"));
        assert_eq!(got.user_id, user.id);
        assert_eq!(got.status, "active");
        assert_eq!(details.plan.unwrap().id, "price_pro");
    }

    #[tokio::test]
    async fn price_failure_degrades_to_missing_plan() {
        let stripe = MockStripeService::new().failing_prices();
        let (users, subscriptions, svc) = service(stripe);
        let user = User::new("ada@example.test", "Ada", None);
        users.create_user(&user).await.unwrap();
        let sub = Subscription::new(user.id, "price_pro");
        subscriptions.create_subscription(&sub).await.unwrap();

        let details = svc.get_customer_details(user.id).await.unwrap();
        assert!(details.subscription.is_some());
        assert!(details.plan.is_none());
    }
}
