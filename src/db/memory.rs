//! In-memory adapters for development and tests. Maps are keyed by the
//! external (Stripe) id, falling back to the internal uuid for rows that were
//! never linked to Stripe. Mutations take the write lock; reads share the
//! read lock.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{subscription::Subscription, user::User};

use super::subscription_repository::SubscriptionRepository;
use super::user_repository::UserRepository;
use super::StoreError;

fn user_key(user: &User) -> String {
    user.stripe_customer_id
        .clone()
        .unwrap_or_else(|| user.id.to_string())
}

fn subscription_key(sub: &Subscription) -> String {
    sub.stripe_subscription_id
        .clone()
        .unwrap_or_else(|| sub.id.to_string())
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().unwrap();
        let key = user_key(user);
        if users.contains_key(&key) || users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("user"));
        }
        users.insert(key, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let users = self.users.read().unwrap();
        users
            .values()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn get_user_by_stripe_customer_id(&self, customer_id: &str) -> Result<User, StoreError> {
        let users = self.users.read().unwrap();
        users
            .get(customer_id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().unwrap();
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn create_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError> {
        let mut subs = self.subscriptions.write().unwrap();
        let key = subscription_key(sub);
        if subs.contains_key(&key) {
            return Err(StoreError::Duplicate("subscription"));
        }
        subs.insert(key, sub.clone());
        Ok(sub.clone())
    }

    async fn get_subscription_by_id(&self, id: Uuid) -> Result<Subscription, StoreError> {
        let subs = self.subscriptions.read().unwrap();
        subs.values()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("subscription"))
    }

    async fn get_subscription_by_stripe_id(
        &self,
        stripe_id: &str,
    ) -> Result<Subscription, StoreError> {
        let subs = self.subscriptions.read().unwrap();
        subs.get(stripe_id)
            .cloned()
            .ok_or(StoreError::NotFound("subscription"))
    }

    async fn get_latest_subscription_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Subscription, StoreError> {
        let subs = self.subscriptions.read().unwrap();
        subs.values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned()
            .ok_or(StoreError::NotFound("subscription"))
    }

    async fn update_subscription_status(&self, key: &str, status: &str) -> Result<(), StoreError> {
        let mut subs = self.subscriptions.write().unwrap();
        let sub = if subs.contains_key(key) {
            subs.get_mut(key)
        } else {
            subs.values_mut().find(|s| s.id.to_string() == key)
        }
        .ok_or(StoreError::NotFound("subscription"))?;
        sub.status = status.to_string();
        sub.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_subscription(&self, sub: &Subscription) -> Result<Subscription, StoreError> {
        let mut subs = self.subscriptions.write().unwrap();
        let key = subscription_key(sub);
        let existing = subs
            .get_mut(&key)
            .ok_or(StoreError::NotFound("subscription"))?;
        existing.status = sub.status.clone();
        existing.current_period_start = sub.current_period_start;
        existing.current_period_end = sub.current_period_end;
        existing.updated_at = OffsetDateTime::now_utc();
        Ok(existing.clone())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let subs = self.subscriptions.read().unwrap();
        let mut all: Vec<Subscription> = subs.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }
}
