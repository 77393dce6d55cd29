//! Redundant profile records, kept in PostgreSQL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Failures reported by the profile store.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// Denormalized copy of user metadata, keyed by the provider-issued uid.
///
/// The creation timestamp is assigned by the store at write time and is
/// never part of this structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub email: String,
    pub role: String,
}

/// Document store operations consumed by the provisioner.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist a profile record under `uid`.
    async fn write(&self, uid: &str, profile: &Profile) -> ProfileResult<()>;
}

/// [`ProfileStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Create a new [`PgProfileStore`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn write(&self, uid: &str, profile: &Profile) -> ProfileResult<()> {
        // `created_at` is filled by the table default, server-side.
        sqlx::query(
            r#"INSERT INTO profiles (user_id, display_name, email, role)
                VALUES ($1, $2, $3, $4)"#,
        )
        .bind(uid)
        .bind(&profile.display_name)
        .bind(&profile.email)
        .bind(&profile.role)
        .execute(&self.pool)
        .await?;

        tracing::debug!(uid, "profile record written");
        Ok(())
    }
}
