use std::sync::Arc;

use crate::config::Config;
use crate::services::customer_details::CustomerDetailsService;
use crate::services::stripe::StripeService;
use crate::services::subscription_service::SubscriptionService;
use crate::services::user_service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub stripe: Arc<dyn StripeService>,
    pub users: Arc<UserService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub customer_details: Arc<CustomerDetailsService>,
    pub config: Arc<Config>,
}
