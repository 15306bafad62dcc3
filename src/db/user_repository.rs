use async_trait::async_trait;
use uuid::Uuid;

use crate::models::user::User;

use super::StoreError;

/// Storage contract for users. Implemented by the Postgres, SQLite and
/// in-memory adapters with identical semantics, so callers and tests are
/// backend-agnostic.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the email or Stripe customer
    /// id is already taken.
    async fn create_user(&self, user: &User) -> Result<User, StoreError>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    async fn get_user_by_stripe_customer_id(&self, customer_id: &str) -> Result<User, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}
