use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Local status for a subscription persisted before Stripe has confirmed it.
pub const STATUS_CREATED: &str = "created";
/// Terminal status. A canceled subscription is never reopened by this service.
pub const STATUS_CANCELED: &str = "canceled";

/// A user's subscription. `stripe_subscription_id` is nullable: rows are
/// created locally before Stripe confirms, and Stripe-side subscriptions can
/// exist with no local row at all (orphans, handled on the cancel path).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Subscription {
    /// A fresh local-only row, not yet linked to Stripe.
    pub fn new(user_id: Uuid, price_id: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            stripe_subscription_id: None,
            stripe_price_id: price_id.to_string(),
            status: STATUS_CREATED.to_string(),
            current_period_start: None,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.status == STATUS_CANCELED
    }
}
