//! Role lookup against the admin_user table.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use gramin_core::{Error, Result, Role, RoleLookup};

/// PostgreSQL implementation of RoleLookup.
///
/// Token issuance and session handling live in the auth collaborator; this
/// core only resolves an opaque admin-user id to a role string.
pub struct PgRoleLookup {
    pool: Pool<Postgres>,
}

impl PgRoleLookup {
    /// Create a new PgRoleLookup with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleLookup for PgRoleLookup {
    async fn role_for(&self, user_id: Uuid) -> Result<Option<Role>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM admin_user WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        // Unknown role strings resolve to None rather than failing; the
        // caller treats that as insufficient privilege.
        Ok(role.as_deref().and_then(Role::parse))
    }
}
