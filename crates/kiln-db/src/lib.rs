//! Build store backends for kiln.

pub mod fallback;
pub mod memory;
pub mod pg;

pub use fallback::FallbackBuildStore;
pub use memory::MemoryBuildStore;
pub use pg::PgBuildStore;

use kiln_core::{Error, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = Self::pool_options()
            .connect(database_url)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a pool without connecting. Connections are opened on first use,
    /// so a server can start while the database is still unreachable.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = Self::pool_options()
            .connect_lazy(database_url)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(5))
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
