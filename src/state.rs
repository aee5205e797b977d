use deadpool_postgres::Pool;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::render::{EscapingMarkup, Markup};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: Pool,
    /// The application's configuration.
    pub config: Config,
    /// The sanitize/linkify collaborators used when rendering content.
    pub markup: Arc<dyn Markup>,
}

impl AppState {
    /// Creates a new `AppState` with the default markup collaborators.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_markup(config, Arc::new(EscapingMarkup))
    }

    /// Creates a new `AppState` with explicit markup collaborators.
    pub fn with_markup(config: &Config, markup: Arc<dyn Markup>) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        tracing::info!("PostgreSQL pool initialized");

        Ok(AppState {
            db,
            config: config.clone(),
            markup,
        })
    }
}
