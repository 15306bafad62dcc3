use std::collections::BTreeMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::user_repository::UserRepository;
use crate::db::StoreError;
use crate::models::subscription::{Subscription, STATUS_CANCELED};

use super::stripe::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CreateCheckoutSessionRequest, StripeService,
};
use super::ServiceError;

/// Owns the subscription status write path and keeps Stripe and the local
/// store consistent across cancel and plan-change flows.
pub struct SubscriptionService {
    users: Arc<dyn UserRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    stripe: Arc<dyn StripeService>,
}

impl SubscriptionService {
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

    /// Persists a local subscription row with status "created". Purely local:
    /// Stripe-side creation belongs to the checkout/customer flow, which
    /// links the row once the processor confirms.
    pub async fn create_subscription(
        &self,
        user_id: &str,
        price_id: &str,
    ) -> Result<Subscription, ServiceError> {
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| ServiceError::InvalidUserId(user_id.to_string()))?;
        let sub = Subscription::new(user_id, price_id);
        Ok(self.subscriptions.create_subscription(&sub).await?)
    }

    /// Cancels a subscription, resolving the identifier in three tiers:
    /// internal id, then Stripe subscription id, then treating the input as a
    /// raw Stripe id for subscriptions that exist only on the processor side.
    ///
    /// For a locally resolved record with a Stripe id, the processor cancel
    /// runs first and the local status flips to "canceled" only after it
    /// succeeds. On processor failure the local row is left untouched: the
    /// store must never claim a cancellation Stripe has not confirmed.
    pub async fn cancel_subscription(&self, id: &str) -> Result<(), ServiceError> {
        let sub = match self.resolve_subscription(id).await {
            Some(sub) => sub,
            None => {
                // Orphaned on the processor side: one cancel attempt, no
                // local writes.
                warn!(id, "subscription unknown locally, attempting stripe-only cancel");
                self.stripe.cancel_subscription(id).await?;
                info!(id, "canceled orphaned stripe subscription");
                return Ok(());
            }
        };

        if sub.is_canceled() {
            info!(subscription_id = %sub.id, "subscription already canceled, nothing to do");
            return Ok(());
        }

        match sub.stripe_subscription_id.as_deref() {
            None => {
                info!(subscription_id = %sub.id, "no stripe subscription linked, canceling locally only");
                self.subscriptions
                    .update_subscription_status(&sub.id.to_string(), STATUS_CANCELED)
                    .await?;
                Ok(())
            }
            Some(stripe_id) => {
                info!(subscription_id = %sub.id, stripe_id, "canceling on stripe");
                self.stripe.cancel_subscription(stripe_id).await.map_err(|err| {
                    warn!(stripe_id, %err, "stripe cancel failed, leaving local status untouched");
                    err
                })?;
                self.subscriptions
                    .update_subscription_status(stripe_id, STATUS_CANCELED)
                    .await?;
                info!(stripe_id, "subscription canceled");
                Ok(())
            }
        }
    }

    async fn resolve_subscription(&self, id: &str) -> Option<Subscription> {
        if let Ok(internal) = Uuid::parse_str(id) {
            if let Ok(sub) = self.subscriptions.get_subscription_by_id(internal).await {
                return Some(sub);
            }
        }
        self.subscriptions.get_subscription_by_stripe_id(id).await.ok()
    }

    /// Local-only status and period sync, driven by processor events.
    /// "canceled" is terminal: an attempt to move a canceled subscription
    /// anywhere else is dropped with a warning rather than applied.
    pub async fn update_subscription_status(
        &self,
        stripe_id: &str,
        status: &str,
        period_end: Option<OffsetDateTime>,
        cancel_at_period_end: bool,
    ) -> Result<(), ServiceError> {
        let existing = self.subscriptions.get_subscription_by_stripe_id(stripe_id).await?;
        if existing.is_canceled() && status != STATUS_CANCELED {
            warn!(stripe_id, status, "ignoring status update for canceled subscription");
            return Ok(());
        }
        if let Some(period_end) = period_end {
            let mut updated = existing;
            updated.status = status.to_string();
            updated.current_period_end = Some(period_end);
            self.subscriptions.update_subscription(&updated).await?;
        } else {
            self.subscriptions
                .update_subscription_status(stripe_id, status)
                .await?;
        }
        info!(stripe_id, status, cancel_at_period_end, "synced subscription status");
        Ok(())
    }

    pub async fn get_subscription(&self, id: Uuid) -> Result<Subscription, ServiceError> {
        Ok(self.subscriptions.get_subscription_by_id(id).await?)
    }

    pub async fn get_latest_for_user(&self, user_id: Uuid) -> Result<Subscription, ServiceError> {
        Ok(self
            .subscriptions
            .get_latest_subscription_for_user(user_id)
            .await?)
    }

    /// Builds a subscription-mode checkout session. When the user already has
    /// a live subscription it is canceled first (plan change); a failed
    /// cancel aborts the whole operation so a broken downgrade can't turn
    /// into a duplicate upgrade.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        user_id: Option<Uuid>,
        customer_id: Option<String>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, ServiceError> {
        if let Some(user_id) = user_id {
            if let Ok(latest) = self
                .subscriptions
                .get_latest_subscription_for_user(user_id)
                .await
            {
                if let Some(stripe_id) = latest.stripe_subscription_id.clone() {
                    if !latest.is_canceled() {
                        info!(%user_id, stripe_id, "canceling prior subscription before checkout");
                        self.cancel_subscription(&stripe_id).await?;
                    }
                }
            }
        }

        let mut req = CreateCheckoutSessionRequest {
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
            mode: CheckoutMode::Subscription,
            line_items: vec![CheckoutLineItem {
                price: price_id.to_string(),
                quantity: 1,
            }],
            customer: None,
            client_reference_id: None,
            metadata: None,
        };

        // Explicit customer id wins; otherwise bind the user's linked
        // customer. Either way a known user is stamped into the metadata so
        // the post-checkout callback can correlate.
        if let Some(customer_id) = customer_id.filter(|c| !c.is_empty()) {
            req.customer = Some(customer_id);
        } else if let Some(user_id) = user_id {
            match self.users.get_user_by_id(user_id).await {
                Ok(user) => req.customer = user.stripe_customer_id,
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        if let Some(user_id) = user_id {
            let mut metadata = BTreeMap::new();
            metadata.insert("user_id".to_string(), user_id.to_string());
            req.metadata = Some(metadata);
        }

        Ok(self.stripe.create_checkout_session(req).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{InMemorySubscriptionRepository, InMemoryUserRepository};
    use crate::models::subscription::STATUS_CREATED;
    use crate::models::user::User;
    use crate::services::stripe::MockStripeService;

    struct Fixture {
        users: Arc<InMemoryUserRepository>,
        subscriptions: Arc<InMemorySubscriptionRepository>,
        stripe: Arc<MockStripeService>,
        service: SubscriptionService,
    }

    fn fixture_with(stripe: MockStripeService) -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let stripe = Arc::new(stripe);
        let service = SubscriptionService::new(
            users.clone(),
            subscriptions.clone(),
            stripe.clone(),
        );
        Fixture {
            users,
            subscriptions,
            stripe,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockStripeService::new())
    }

    async fn seed_linked_subscription(fx: &Fixture, stripe_id: &str, status: &str) -> Subscription {
        let mut sub = Subscription::new(Uuid::new_v4(), "price_abc");
        sub.stripe_subscription_id = Some(stripe_id.to_string());
        sub.status = status.to_string();
        fx.subscriptions.create_subscription(&sub).await.unwrap()
    }

    #[tokio::test]
    async fn create_subscription_persists_created_row() {
        let fx = fixture();
        let sub = fx
            .service
            .create_subscription("11111111-1111-1111-1111-111111111111", "price_abc")
            .await
            .unwrap();
        assert_eq!(sub.status, STATUS_CREATED);
        assert_eq!(sub.stripe_price_id, "price_abc");
        assert!(sub.stripe_subscription_id.is_none());

        let user_id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let latest = fx.service.get_latest_for_user(user_id).await.unwrap();
        assert_eq!(latest.id, sub.id);
    }

    #[tokio::test]
    async fn create_subscription_rejects_malformed_user_id() {
        let fx = fixture();
        let err = fx
            .service
            .create_subscription("cus_not_a_uuid", "price_abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidUserId(_)));
    }

    #[tokio::test]
    async fn cancel_without_stripe_link_is_local_only() {
        let fx = fixture();
        let sub = fx
            .service
            .create_subscription(&Uuid::new_v4().to_string(), "price_abc")
            .await
            .unwrap();

        fx.service.cancel_subscription(&sub.id.to_string()).await.unwrap();

        let reloaded = fx.service.get_subscription(sub.id).await.unwrap();
        assert_eq!(reloaded.status, STATUS_CANCELED);
        assert!(fx.stripe.cancel_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_with_stripe_link_goes_processor_first() {
        let fx = fixture();
        let sub = seed_linked_subscription(&fx, "sub_linked", "active").await;

        fx.service.cancel_subscription("sub_linked").await.unwrap();

        assert_eq!(fx.stripe.cancel_calls.lock().unwrap().as_slice(), ["sub_linked"]);
        let reloaded = fx.service.get_subscription(sub.id).await.unwrap();
        assert_eq!(reloaded.status, STATUS_CANCELED);
    }

    #[tokio::test]
    async fn failed_processor_cancel_leaves_local_status_untouched() {
        let fx = fixture_with(MockStripeService::new().failing_cancels());
        let sub = seed_linked_subscription(&fx, "sub_stuck", "active").await;

        let err = fx.service.cancel_subscription("sub_stuck").await.unwrap_err();
        assert!(matches!(err, ServiceError::Stripe(_)));

        let reloaded = fx.service.get_subscription(sub.id).await.unwrap();
        assert_eq!(reloaded.status, "active");
    }

    #[tokio::test]
    async fn orphan_cancel_hits_stripe_once_and_writes_nothing() {
        let fx = fixture();
        fx.service.cancel_subscription("sub_orphan").await.unwrap();

        assert_eq!(fx.stripe.cancel_calls.lock().unwrap().as_slice(), ["sub_orphan"]);
        assert!(fx.subscriptions.list_subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_resolves_by_internal_id_before_stripe_id() {
        let fx = fixture();
        let sub = seed_linked_subscription(&fx, "sub_by_internal", "active").await;

        fx.service.cancel_subscription(&sub.id.to_string()).await.unwrap();
        assert_eq!(
            fx.stripe.cancel_calls.lock().unwrap().as_slice(),
            ["sub_by_internal"]
        );
    }

    #[tokio::test]
    async fn cancel_already_canceled_is_a_noop() {
        let fx = fixture();
        seed_linked_subscription(&fx, "sub_done", STATUS_CANCELED).await;

        fx.service.cancel_subscription("sub_done").await.unwrap();
        assert!(fx.stripe.cancel_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_sync_refuses_to_reopen_canceled_subscription() {
        let fx = fixture();
        let sub = seed_linked_subscription(&fx, "sub_final", STATUS_CANCELED).await;

        fx.service
            .update_subscription_status("sub_final", "active", None, false)
            .await
            .unwrap();

        let reloaded = fx.service.get_subscription(sub.id).await.unwrap();
        assert_eq!(reloaded.status, STATUS_CANCELED);
    }

    #[tokio::test]
    async fn status_sync_updates_status_and_period() {
        let fx = fixture();
        let sub = seed_linked_subscription(&fx, "sub_sync", "active").await;
        let period_end = OffsetDateTime::now_utc() + time::Duration::days(30);

        fx.service
            .update_subscription_status("sub_sync", "past_due", Some(period_end), false)
            .await
            .unwrap();

        let reloaded = fx.service.get_subscription(sub.id).await.unwrap();
        assert_eq!(reloaded.status, "past_due");
        assert_eq!(reloaded.current_period_end, Some(period_end));
    }

    #[tokio::test]
    async fn checkout_cancels_live_prior_subscription_first() {
        let fx = fixture();
        let user = User::new("ada@example.test", "Ada", Some("cus_ada".into()));
        fx.users.create_user(&user).await.unwrap();
        let mut prior = Subscription::new(user.id, "price_old");
        prior.stripe_subscription_id = Some("sub_prior".into());
        prior.status = "active".into();
        fx.subscriptions.create_subscription(&prior).await.unwrap();

        let session = fx
            .service
            .create_checkout_session(
                "price_new",
                Some(user.id),
                None,
                "https://example.test/success",
                "https://example.test/cancel",
            )
            .await
            .unwrap();
        assert!(session.url.is_some());

        assert_eq!(fx.stripe.cancel_calls.lock().unwrap().as_slice(), ["sub_prior"]);
        let reloaded = fx.service.get_subscription(prior.id).await.unwrap();
        assert_eq!(reloaded.status, STATUS_CANCELED);
    }

    #[tokio::test]
    async fn checkout_skips_cancel_for_already_canceled_prior() {
        let fx = fixture();
        let user = User::new("ada@example.test", "Ada", Some("cus_ada".into()));
        fx.users.create_user(&user).await.unwrap();
        let mut prior = Subscription::new(user.id, "price_old");
        prior.stripe_subscription_id = Some("sub_old".into());
        prior.status = STATUS_CANCELED.into();
        fx.subscriptions.create_subscription(&prior).await.unwrap();

        fx.service
            .create_checkout_session(
                "price_new",
                Some(user.id),
                None,
                "https://example.test/success",
                "https://example.test/cancel",
            )
            .await
            .unwrap();

        assert!(fx.stripe.cancel_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_aborts_when_prior_cancel_fails() {
        let fx = fixture_with(MockStripeService::new().failing_cancels());
        let user = User::new("ada@example.test", "Ada", Some("cus_ada".into()));
        fx.users.create_user(&user).await.unwrap();
        let mut prior = Subscription::new(user.id, "price_old");
        prior.stripe_subscription_id = Some("sub_wedged".into());
        prior.status = "active".into();
        fx.subscriptions.create_subscription(&prior).await.unwrap();

        let err = fx
            .service
            .create_checkout_session(
                "price_new",
                Some(user.id),
                None,
                "https://example.test/success",
                "https://example.test/cancel",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Stripe(_)));
        assert!(fx.stripe.last_create_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_binds_explicit_customer_over_user_lookup() {
        let fx = fixture();
        let user = User::new("ada@example.test", "Ada", Some("cus_from_repo".into()));
        fx.users.create_user(&user).await.unwrap();

        fx.service
            .create_checkout_session(
                "price_abc",
                Some(user.id),
                Some("cus_explicit".into()),
                "https://example.test/success",
                "https://example.test/cancel",
            )
            .await
            .unwrap();

        let captured = fx.stripe.last_create_requests.lock().unwrap();
        assert_eq!(captured[0].customer.as_deref(), Some("cus_explicit"));
        let metadata = captured[0].metadata.as_ref().unwrap();
        assert_eq!(metadata.get("user_id").unwrap(), &user.id.to_string());
    }

    #[tokio::test]
    async fn checkout_resolves_customer_from_repository() {
        let fx = fixture();
        let user = User::new("ada@example.test", "Ada", Some("cus_from_repo".into()));
        fx.users.create_user(&user).await.unwrap();

        fx.service
            .create_checkout_session(
                "price_abc",
                Some(user.id),
                None,
                "https://example.test/success",
                "https://example.test/cancel",
            )
            .await
            .unwrap();

        let captured = fx.stripe.last_create_requests.lock().unwrap();
        assert_eq!(captured[0].customer.as_deref(), Some("cus_from_repo"));
        assert_eq!(captured[0].line_items[0].price, "price_abc");
        assert_eq!(captured[0].line_items[0].quantity, 1);
        assert_eq!(captured[0].mode, CheckoutMode::Subscription);
    }
}
