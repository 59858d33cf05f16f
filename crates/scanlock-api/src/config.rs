//! Server configuration from the environment.

use serde::Deserialize;

/// API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Socket address to bind.
    pub bind_addr: String,
    /// PostgreSQL connection string.
    pub database_url: String,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// `SCANLOCK_BIND_ADDR` defaults to `0.0.0.0:8080`; `DATABASE_URL` is
    /// required.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("SCANLOCK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        Ok(Self {
            bind_addr,
            database_url,
        })
    }
}
