pub mod customer_details;
pub mod stripe;
pub mod subscription_service;
pub mod user_service;

use crate::db::StoreError;
use stripe::StripeServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid user id: {0}")]
    InvalidUserId(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Stripe(#[from] StripeServiceError),
    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => ServiceError::NotFound(entity),
            StoreError::Duplicate(entity) => ServiceError::Conflict(entity),
            other => ServiceError::Storage(other),
        }
    }
}
