//! Relationship-gated content visibility with capability-protected PII.
//!
//! The core decides which posts a viewer may see (a directed follow edge from
//! viewer to author, or authorship, or the post being public) and makes
//! accidental PII leaks structurally hard: real names and emails travel
//! through the application sealed, openable only by the one render path that
//! holds the matching capability. Every query touching client input is
//! composed from trusted fragments with values bound out-of-band.

pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod render;
pub mod schema;
pub mod sql;
pub mod state;

pub mod models {
    pub mod account;
    pub mod post;
}

pub mod repositories {
    pub mod friendship;
    pub mod post;
    pub mod session;
}

pub mod services {
    pub mod feed;
    pub mod post;
    pub mod session;
}

pub mod handlers {
    pub mod account;
    pub mod feed;
    pub mod post;
}

pub mod middleware_layer {
    pub mod session;
}

pub use capability::{Key, Sealed};
pub use error::{AppError, Result};
