use std::env;
use anyhow::{Context, Result};

/// How long an idle session stays valid, in seconds.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The port the HTTP server binds to.
    pub port: u16,
    /// Sessions idle for longer than this many seconds are expired.
    pub session_ttl_secs: i64,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,
            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_SESSION_TTL_SECS.to_string())
                .parse()
                .context("Invalid SESSION_TTL_SECS")?,
        })
    }
}
