//! database (db) union structure.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "provisa";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Database connections holder.
#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Init database connections.
    pub async fn new(
        hostname: &str,
        username: &str,
        password: &str,
        db: &str,
        pool: u32,
    ) -> Result<Self, sqlx::Error> {
        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new().max_connections(pool);
        let postgres = pool.connect(&addr).await?;

        tracing::info!(%hostname, %db, "postgres connected");

        Ok(Self { postgres })
    }
}
