use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use billing_backend::config::Config;
use billing_backend::db::connection::Database;
use billing_backend::routes;
use billing_backend::services::customer_details::CustomerDetailsService;
use billing_backend::services::stripe::LiveStripeService;
use billing_backend::services::subscription_service::SubscriptionService;
use billing_backend::services::user_service::UserService;
use billing_backend::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env()?);

    let database = Database::connect(&config.database_url).await?;
    database
        .apply_sqlite_migrations(Path::new("./migrations/sqlite"))
        .await?;
    let (user_repo, subscription_repo) = database.repositories();

    let stripe = Arc::new(LiveStripeService::new(config.stripe_secret_key.clone()));

    let state = AppState {
        stripe: stripe.clone(),
        users: Arc::new(UserService::new(user_repo.clone(), stripe.clone())),
        subscriptions: Arc::new(SubscriptionService::new(
            user_repo.clone(),
            subscription_repo.clone(),
            stripe.clone(),
        )),
        customer_details: Arc::new(CustomerDetailsService::new(
            user_repo,
            subscription_repo,
            stripe,
        )),
        config: config.clone(),
    };

    let cors = match config.frontend_origin.as_deref() {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([CONTENT_TYPE]),
    };

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
