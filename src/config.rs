//! Application configuration loaded from the environment.

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    ///
    /// The JWT signing secret has no default: a process without one cannot
    /// issue or verify credentials, so startup fails instead.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./taskdeck.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET is not set; refusing to start without a signing key")?;

        let token_ttl_secs = std::env::var("TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "7200".to_string())
            .parse()
            .unwrap_or(7200);

        Ok(Self {
            database_path,
            port,
            jwt_secret,
            token_ttl_secs,
        })
    }
}
