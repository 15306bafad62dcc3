//! SQLite adapters. Ids and timestamps live in TEXT columns; timestamp reads
//! go through the layout-sniffing parser in [`super::timestamps`] because
//! older databases mix encodings.

use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{subscription::Subscription, user::User};

use super::subscription_repository::SubscriptionRepository;
use super::timestamps;
use super::user_repository::UserRepository;
use super::StoreError;

type UserRow = (String, String, String, Option<String>, String, String);
type SubscriptionRow = (
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
);

fn parse_uuid(entity: &'static str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::Corrupt(format!("{entity} id is not a uuid: {value:?}")))
}

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (id, email, name, stripe_customer_id, created_at, updated_at) = row;
    Ok(User {
        id: parse_uuid("user", &id)?,
        email,
        name,
        stripe_customer_id,
        created_at: timestamps::parse_any("created_at", &created_at)?,
        updated_at: timestamps::parse_any("updated_at", &updated_at)?,
    })
}

fn subscription_from_row(row: SubscriptionRow) -> Result<Subscription, StoreError> {
    let (
        id,
        user_id,
        stripe_subscription_id,
        stripe_price_id,
        status,
        current_period_start,
        current_period_end,
        created_at,
        updated_at,
    ) = row;
    Ok(Subscription {
        id: parse_uuid("subscription", &id)?,
        user_id: parse_uuid("subscription user", &user_id)?,
        stripe_subscription_id,
        stripe_price_id,
        status,
        current_period_start: timestamps::parse_any_opt(
            "current_period_start",
            current_period_start.as_deref(),
        )?,
        current_period_end: timestamps::parse_any_opt(
            "current_period_end",
            current_period_end.as_deref(),
        )?,
        created_at: timestamps::parse_any("created_at", &created_at)?,
        updated_at: timestamps::parse_any("updated_at", &updated_at)?,
    })
}

fn text_opt(ts: Option<OffsetDateTime>) -> Result<Option<String>, StoreError> {
    ts.map(timestamps::to_text).transpose()
}

pub struct SqliteUserRepository {
    pub pool: SqlitePool,
}

const USER_COLUMNS: &str = "id, email, name, stripe_customer_id, created_at, updated_at";

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: &User) -> Result<User, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
        ))
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.stripe_customer_id)
        .bind(timestamps::to_text(user.created_at)?)
        .bind(timestamps::to_text(user.updated_at)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::on_insert("user", e))?;
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))?;
        user_from_row(row)
    }

    async fn get_user_by_stripe_customer_id(&self, customer_id: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE stripe_customer_id = ?"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))?;
        user_from_row(row)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(user_from_row).collect()
    }
}

pub struct SqliteSubscriptionRepository {
    pub pool: SqlitePool,
}

const SUB_COLUMNS: &str = "id, user_id, stripe_subscription_id, stripe_price_id, status, \
                           current_period_start, current_period_end, created_at, updated_at";

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn create_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO subscriptions ({SUB_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(sub.id.to_string())
        .bind(sub.user_id.to_string())
        .bind(&sub.stripe_subscription_id)
        .bind(&sub.stripe_price_id)
        .bind(&sub.status)
        .bind(text_opt(sub.current_period_start)?)
        .bind(text_opt(sub.current_period_end)?)
        .bind(timestamps::to_text(sub.created_at)?)
        .bind(timestamps::to_text(sub.updated_at)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::on_insert("subscription", e))?;
        Ok(sub.clone())
    }

    async fn get_subscription_by_id(&self, id: Uuid) -> Result<Subscription, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))?;
        subscription_from_row(row)
    }

    async fn get_subscription_by_stripe_id(
        &self,
        stripe_id: &str,
    ) -> Result<Subscription, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE stripe_subscription_id = ?"
        ))
        .bind(stripe_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))?;
        subscription_from_row(row)
    }

    async fn get_latest_subscription_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Subscription, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions
             WHERE user_id = ? ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("subscription"))?;
        subscription_from_row(row)
    }

    async fn update_subscription_status(&self, key: &str, status: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = ?, updated_at = ?
             WHERE stripe_subscription_id = ? OR id = ?",
        )
        .bind(status)
        .bind(timestamps::to_text(OffsetDateTime::now_utc())?)
        .bind(key)
        .bind(key)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("subscription"));
        }
        Ok(())
    }

    async fn update_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError> {
        let now = OffsetDateTime::now_utc();
        let result = sqlx::query(
            "UPDATE subscriptions
             SET status = ?, current_period_start = ?, current_period_end = ?, updated_at = ?
             WHERE stripe_subscription_id = ?",
        )
        .bind(&sub.status)
        .bind(text_opt(sub.current_period_start)?)
        .bind(text_opt(sub.current_period_end)?)
        .bind(timestamps::to_text(now)?)
        .bind(&sub.stripe_subscription_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("subscription"));
        }
        let mut updated = sub.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(subscription_from_row).collect()
    }
}
