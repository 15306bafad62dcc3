use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::db::user_repository::UserRepository;
use crate::db::StoreError;
use crate::models::user::User;

use super::stripe::{CustomerInfo, StripeService};
use super::ServiceError;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    stripe: Arc<dyn StripeService>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, stripe: Arc<dyn StripeService>) -> Self {
        Self { users, stripe }
    }

    /// Creates the customer on Stripe first, then persists the local user
    /// linked to it. A duplicate local user surfaces as `Conflict`; the
    /// Stripe customer is not rolled back (Stripe tolerates unreferenced
    /// customers, local uniqueness is what matters).
    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
    ) -> Result<(CustomerInfo, User), ServiceError> {
        let customer = self.stripe.create_customer(email, Some(name)).await?;
        let user = User::new(email, name, Some(customer.id.clone()));
        let user = self.users.create_user(&user).await?;
        info!(user_id = %user.id, customer_id = %customer.id, "created customer");
        Ok((customer, user))
    }

    /// Find-or-create keyed by Stripe customer id, used when a completed
    /// checkout session is retrieved and the purchaser may not exist locally.
    pub async fn upsert_from_checkout(
        &self,
        email: &str,
        name: &str,
        stripe_customer_id: &str,
    ) -> Result<User, ServiceError> {
        match self
            .users
            .get_user_by_stripe_customer_id(stripe_customer_id)
            .await
        {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => {
                let user = User::new(email, name, Some(stripe_customer_id.to_string()));
                let user = self.users.create_user(&user).await?;
                info!(user_id = %user.id, customer_id = stripe_customer_id, "created user from checkout session");
                Ok(user)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, ServiceError> {
        Ok(self.users.get_user_by_id(id).await?)
    }

    pub async fn get_user_by_stripe_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<User, ServiceError> {
        Ok(self
            .users
            .get_user_by_stripe_customer_id(customer_id)
            .await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.users.list_users().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryUserRepository;
    use crate::services::stripe::MockStripeService;

    fn service() -> (UserService, Arc<MockStripeService>) {
        let stripe = Arc::new(MockStripeService::new());
        let users = Arc::new(InMemoryUserRepository::new());
        (UserService::new(users, stripe.clone()), stripe)
    }

    #[tokio::test]
    async fn create_customer_links_stripe_id_and_round_trips() {
        let (service, _stripe) = service();
        let (customer, user) = service
            .create_customer("ada@example.test", "Ada Lovelace")
            .await
            .unwrap();

        assert_eq!(user.email, "ada@example.test");
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.stripe_customer_id.as_deref(), Some(customer.id.as_str()));

        let found = service
            .get_user_by_stripe_customer_id(&customer.id)
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, user.email);
    }

    #[tokio::test]
    async fn duplicate_customer_is_conflict() {
        let (service, _stripe) = service();
        service
            .create_customer("ada@example.test", "Ada")
            .await
            .unwrap();
        let err = service
            .create_customer("ada@example.test", "Ada Again")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict("user")));
    }

    #[tokio::test]
    async fn upsert_returns_existing_user_without_creating() {
        let (service, _stripe) = service();
        let (customer, user) = service
            .create_customer("ada@example.test", "Ada")
            .await
            .unwrap();

        let upserted = service
            .upsert_from_checkout("other@example.test", "Other", &customer.id)
            .await
            .unwrap();
        assert_eq!(upserted.id, user.id);
        assert_eq!(service.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_creates_missing_user() {
        let (service, _stripe) = service();
        let user = service
            .upsert_from_checkout("new@example.test", "New", "cus_fresh")
            .await
            .unwrap();
        assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_fresh"));
        assert_eq!(service.list_users().await.unwrap().len(), 1);
    }
}
