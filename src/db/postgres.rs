use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{subscription::Subscription, user::User};

use super::subscription_repository::SubscriptionRepository;
use super::user_repository::UserRepository;
use super::StoreError;

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, name, stripe_customer_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, email, name, stripe_customer_id, created_at, updated_at",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.stripe_customer_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::on_insert("user", e))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, stripe_customer_id, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))
    }

    async fn get_user_by_stripe_customer_id(&self, customer_id: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, stripe_customer_id, created_at, updated_at
             FROM users WHERE stripe_customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, name, stripe_customer_id, created_at, updated_at
             FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

pub struct PostgresSubscriptionRepository {
    pub pool: PgPool,
}

const SUB_COLUMNS: &str = "id, user_id, stripe_subscription_id, stripe_price_id, status, \
                           current_period_start, current_period_end, created_at, updated_at";

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn create_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "INSERT INTO subscriptions ({SUB_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {SUB_COLUMNS}"
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_price_id)
        .bind(&sub.status)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::on_insert("subscription", e))
    }

    async fn get_subscription_by_id(&self, id: Uuid) -> Result<Subscription, StoreError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))
    }

    async fn get_subscription_by_stripe_id(
        &self,
        stripe_id: &str,
    ) -> Result<Subscription, StoreError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE stripe_subscription_id = $1"
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))
    }

    async fn get_latest_subscription_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Subscription, StoreError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))
    }

    async fn update_subscription_status(&self, key: &str, status: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = $1, updated_at = $2
             WHERE stripe_subscription_id = $3 OR id::text = $3",
        )
        .bind(status)
        .bind(OffsetDateTime::now_utc())
        .bind(key)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("subscription"));
        }
        Ok(())
    }

    async fn update_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError> {
        sqlx::query_as::<_, Subscription>(&format!(
            "UPDATE subscriptions
             SET status = $1, current_period_start = $2, current_period_end = $3, updated_at = $4
             WHERE stripe_subscription_id = $5
             RETURNING {SUB_COLUMNS}"
        ))
        .bind(&sub.status)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .bind(OffsetDateTime::now_utc())
        .bind(&sub.stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let subs = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }
}
