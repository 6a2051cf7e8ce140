//! Audit ledger read access.
//!
//! Writes happen only inside `PgVillageLinkRepository` transactions; this
//! repository exposes the ledger for review screens and rollback lookups.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use gramin_core::{
    AuditAction, AuditEntry, AuditRepository, Error, ItemKind, LinkSnapshot, Result,
};

/// PostgreSQL implementation of AuditRepository.
pub struct PgAuditRepository {
    pool: Pool<Postgres>,
}

impl PgAuditRepository {
    /// Create a new PgAuditRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_audit_row(row: sqlx::postgres::PgRow) -> Result<AuditEntry> {
        let item_kind: String = row.get("item_kind");
        let action: String = row.get("action");
        let before_json: Option<serde_json::Value> = row.get("before_state");
        let after_json: Option<serde_json::Value> = row.get("after_state");

        let before_state: Option<LinkSnapshot> =
            before_json.map(serde_json::from_value).transpose()?;
        let after_state: Option<LinkSnapshot> =
            after_json.map(serde_json::from_value).transpose()?;

        Ok(AuditEntry {
            id: row.get("id"),
            village_id: row.get("village_id"),
            item_kind: ItemKind::parse(&item_kind)
                .ok_or_else(|| Error::Internal(format!("Unknown item_kind: {item_kind}")))?,
            item_id: row.get("item_id"),
            action: AuditAction::parse(&action)
                .ok_or_else(|| Error::Internal(format!("Unknown audit action: {action}")))?,
            before_state,
            after_state,
            changed_by: row.get("changed_by"),
            reason: row.get("reason"),
            created_at: row.get("created_at"),
        })
    }
}

const AUDIT_COLUMNS: &str = "id, village_id, item_kind, item_id, action, before_state, \
                             after_state, changed_by, reason, created_at";

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn fetch(&self, id: Uuid) -> Result<AuditEntry> {
        let row = sqlx::query(&format!(
            "SELECT {AUDIT_COLUMNS} FROM village_link_audit WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Self::parse_audit_row(row),
            None => Err(Error::AuditNotFound(id)),
        }
    }

    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {AUDIT_COLUMNS} FROM village_link_audit
             WHERE village_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(village_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_audit_row).collect()
    }
}
