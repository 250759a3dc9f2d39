//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MP_ACCESS_TOKEN` (required): Mercado Pago API access token
/// - `MP_BASE_URL` (optional): Mercado Pago API base URL, defaults to the production API
/// - `MP_TIMEOUT_SECS` (optional): gateway request timeout, defaults to 5 seconds
/// - `MP_WEBHOOK_SECRET` (optional): secret for webhook signature verification;
///   when unset, webhooks are validated by origin marker only
///
/// The gateway credentials configure a single adapter instance built at
/// startup and shared by both the direct payment path and the webhook path,
/// so the two paths can never drift apart in gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub mp_access_token: String,

    #[serde(default = "default_mp_base_url")]
    pub mp_base_url: String,

    #[serde(default = "default_mp_timeout_secs")]
    pub mp_timeout_secs: u64,

    #[serde(default)]
    pub mp_webhook_secret: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Default Mercado Pago API base URL.
fn default_mp_base_url() -> String {
    "https://api.mercadopago.com".to_string()
}

/// Default gateway timeout in seconds.
///
/// Every gateway call is bounded by this timeout. A timed-out call is
/// reported as "gateway unavailable", never as a settled or failed payment:
/// the charge may still be in flight and a later webhook can settle it.
fn default_mp_timeout_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL, MP_ACCESS_TOKEN)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}
