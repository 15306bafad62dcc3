use async_trait::async_trait;
use uuid::Uuid;

use crate::models::subscription::Subscription;

use super::StoreError;

/// Storage contract for subscriptions. No business logic lives here; status
/// transitions are owned by the subscription service.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the Stripe subscription id is
    /// already taken.
    async fn create_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError>;
    async fn get_subscription_by_id(&self, id: Uuid) -> Result<Subscription, StoreError>;
    async fn get_subscription_by_stripe_id(&self, stripe_id: &str)
        -> Result<Subscription, StoreError>;
    /// Most recently created subscription for the user, the read side's
    /// notion of "current plan".
    async fn get_latest_subscription_for_user(&self, user_id: Uuid)
        -> Result<Subscription, StoreError>;
    /// Sets the status and refreshes `updated_at`. `key` matches the Stripe
    /// subscription id first and falls back to the internal id, so rows that
    /// were never linked to Stripe stay addressable.
    async fn update_subscription_status(&self, key: &str, status: &str) -> Result<(), StoreError>;
    /// Replaces status and billing period, keyed by Stripe subscription id.
    async fn update_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError>;
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError>;
}
