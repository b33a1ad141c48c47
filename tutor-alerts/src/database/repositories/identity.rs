//! Identity lookup repository.
//!
//! Identities are owned by the authentication service; this repository is
//! the read seam used to validate notification producers, plus an upsert
//! used to mirror or seed identities.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::IdentityDbModel;
use crate::domain::Identity;

/// Identity lookup trait.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Resolve an identity by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>>;

    /// Insert or replace an identity.
    async fn upsert(&self, identity: &Identity) -> Result<()>;
}

/// SQLx implementation of IdentityRepository.
pub struct SqlxIdentityRepository {
    pool: SqlitePool,
}

impl SqlxIdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRepository for SqlxIdentityRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityDbModel>("SELECT * FROM identity WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Identity::try_from).transpose()
    }

    async fn upsert(&self, identity: &Identity) -> Result<()> {
        let row = IdentityDbModel::from(identity);
        sqlx::query(
            r#"
            INSERT INTO identity (id, display_name, role) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role
            "#,
        )
        .bind(&row.id)
        .bind(&row.display_name)
        .bind(&row.role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
