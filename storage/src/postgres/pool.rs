//! PostgreSQL connection pool wrapper for the storage crate.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Manages a single PostgreSQL pool.
#[derive(Clone)]
pub struct PgPoolManager {
    pool: PgPool,
}

impl PgPoolManager {
    /// Creates a pool for the given `postgres://` / `postgresql://` URL.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        info!(
            database = %redact_password(database_url),
            max_connections = MAX_CONNECTIONS,
            "Initializing PostgreSQL pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Replaces the password of a connection URL with `***` for logging.
pub fn redact_password(database_url: &str) -> String {
    let Some(scheme_end) = database_url.find("://") else {
        return database_url.to_string();
    };
    let rest = &database_url[scheme_end + 3..];
    let Some(at) = rest.rfind('@') else {
        return database_url.to_string();
    };
    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &database_url[..scheme_end + 3],
            &credentials[..colon],
            &rest[at..]
        ),
        None => database_url.to_string(),
    }
}
