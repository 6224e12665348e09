//! PostgreSQL implementation of the repository traits.

mod conversation;
mod document;
mod message;
mod pool;
mod schema;

use tracing::info;

pub use pool::{redact_password, PgPoolManager};

/// Repository backed by a PostgreSQL pool. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool_manager: PgPoolManager,
}

impl PgStore {
    /// Connects to `database_url` and creates the tables if they do not exist.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool_manager = PgPoolManager::new(database_url).await?;
        let store = Self { pool_manager };
        store.init().await?;
        Ok(store)
    }

    /// Wraps an existing pool without touching the schema.
    pub fn with_pool_manager(pool_manager: PgPoolManager) -> Self {
        Self { pool_manager }
    }

    pub async fn init(&self) -> Result<(), sqlx::Error> {
        info!("Creating database tables if not exist");
        schema::create_tables(self.pool_manager.pool()).await?;
        info!("Database tables created successfully");
        Ok(())
    }

    /// Runs `SELECT 1`; used by the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .execute(self.pool_manager.pool())
            .await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &sqlx::PgPool {
        self.pool_manager.pool()
    }
}
