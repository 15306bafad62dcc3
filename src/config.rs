use std::env;

use anyhow::{bail, Result};

pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub stripe_secret_key: String,
    pub app_success_url: String,
    pub app_cancel_url: String,
    pub frontend_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file

        let server_port = match env::var("SERVER_PORT") {
            Ok(raw) => raw.parse()?,
            Err(_) => 8080,
        };

        let Ok(database_url) = env::var("DATABASE_URL") else {
            bail!("DATABASE_URL must be set");
        };
        let Ok(stripe_secret_key) = env::var("STRIPE_SECRET_KEY") else {
            bail!("STRIPE_SECRET_KEY must be set");
        };

        let app_success_url = env::var("APP_SUCCESS_URL").unwrap_or_default();
        let app_cancel_url = env::var("APP_CANCEL_URL").unwrap_or_default();
        let frontend_origin = env::var("FRONTEND_ORIGIN").ok();

        Ok(Config {
            server_port,
            database_url,
            stripe_secret_key,
            app_success_url,
            app_cancel_url,
            frontend_origin,
        })
    }
}
