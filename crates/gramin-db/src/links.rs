//! Village-link repository implementation.
//!
//! Every mutating method here pairs the link write with exactly one audit
//! row inside a single transaction. Rollback appends a new ledger entry
//! rather than editing history; the `village_link_audit` table only ever
//! grows.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use gramin_core::{
    new_v7, AuditAction, AuditEntry, Error, ItemKind, LinkSnapshot, LinkStatus, Result,
    UpsertLinkRequest, VillageLink, VillageLinkRepository,
};

/// PostgreSQL implementation of VillageLinkRepository.
pub struct PgVillageLinkRepository {
    pool: Pool<Postgres>,
}

impl PgVillageLinkRepository {
    /// Create a new PgVillageLinkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_link_row(row: sqlx::postgres::PgRow) -> VillageLink {
        let item_kind: String = row.get("item_kind");
        let status: String = row.get("status");
        VillageLink {
            id: row.get("id"),
            village_id: row.get("village_id"),
            item_kind: ItemKind::parse(&item_kind).unwrap_or(ItemKind::Provider),
            item_id: row.get("item_id"),
            status: LinkStatus::parse(&status).unwrap_or(LinkStatus::Unlinked),
            promote: row.get("promote"),
            priority: row.get("priority"),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Lock and load the link row for a composite key, if present.
    async fn fetch_for_update(
        tx: &mut Transaction<'_, Postgres>,
        village_id: Uuid,
        item_kind: ItemKind,
        item_id: Uuid,
    ) -> Result<Option<VillageLink>> {
        let row = sqlx::query(
            "SELECT id, village_id, item_kind, item_id, status, promote, priority,
                    created_by, created_at, updated_at
             FROM village_link
             WHERE village_id = $1 AND item_kind = $2 AND item_id = $3
             FOR UPDATE",
        )
        .bind(village_id)
        .bind(item_kind.as_str())
        .bind(item_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_link_row))
    }

    /// Append one audit row inside the caller's transaction and return it.
    #[allow(clippy::too_many_arguments)]
    async fn insert_audit(
        tx: &mut Transaction<'_, Postgres>,
        village_id: Uuid,
        item_kind: ItemKind,
        item_id: Uuid,
        action: AuditAction,
        before_state: Option<LinkSnapshot>,
        after_state: Option<LinkSnapshot>,
        changed_by: Uuid,
        reason: &str,
    ) -> Result<AuditEntry> {
        let entry = AuditEntry {
            id: new_v7(),
            village_id,
            item_kind,
            item_id,
            action,
            before_state,
            after_state,
            changed_by,
            reason: reason.to_string(),
            created_at: Utc::now(),
        };

        let before_json = entry
            .before_state
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let after_json = entry
            .after_state
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            "INSERT INTO village_link_audit
                 (id, village_id, item_kind, item_id, action, before_state, after_state,
                  changed_by, reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(entry.id)
        .bind(entry.village_id)
        .bind(entry.item_kind.as_str())
        .bind(entry.item_id)
        .bind(entry.action.as_str())
        .bind(before_json)
        .bind(after_json)
        .bind(entry.changed_by)
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(entry)
    }
}

#[async_trait]
impl VillageLinkRepository for PgVillageLinkRepository {
    async fn upsert_linked(&self, req: UpsertLinkRequest) -> Result<AuditEntry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing =
            Self::fetch_for_update(&mut tx, req.village_id, req.item_kind, req.item_id).await?;

        let (action, before_state, after_state) = match existing {
            Some(ref link) => {
                let before = LinkSnapshot::from(link);
                sqlx::query(
                    "UPDATE village_link
                     SET status = 'linked', promote = $1, priority = $2, updated_at = $3
                     WHERE id = $4",
                )
                .bind(req.promote)
                .bind(req.priority)
                .bind(now)
                .bind(link.id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

                // Re-link preserves the original creator.
                let after = LinkSnapshot {
                    status: LinkStatus::Linked,
                    promote: req.promote,
                    priority: req.priority,
                    created_by: link.created_by,
                };
                (AuditAction::Update, Some(before), Some(after))
            }
            None => {
                sqlx::query(
                    "INSERT INTO village_link
                         (id, village_id, item_kind, item_id, status, promote, priority,
                          created_by, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, 'linked', $5, $6, $7, $8, $8)",
                )
                .bind(new_v7())
                .bind(req.village_id)
                .bind(req.item_kind.as_str())
                .bind(req.item_id)
                .bind(req.promote)
                .bind(req.priority)
                .bind(req.actor)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

                let after = LinkSnapshot {
                    status: LinkStatus::Linked,
                    promote: req.promote,
                    priority: req.priority,
                    created_by: req.actor,
                };
                (AuditAction::Link, None, Some(after))
            }
        };

        let entry = Self::insert_audit(
            &mut tx,
            req.village_id,
            req.item_kind,
            req.item_id,
            action,
            before_state,
            after_state,
            req.actor,
            &req.reason,
        )
        .await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(entry)
    }

    async fn unlink(
        &self,
        village_id: Uuid,
        item_kind: ItemKind,
        item_id: Uuid,
        actor: Uuid,
        reason: &str,
    ) -> Result<AuditEntry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let link = Self::fetch_for_update(&mut tx, village_id, item_kind, item_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Link ({village_id}, {}, {item_id})",
                    item_kind.as_str()
                ))
            })?;

        let before = LinkSnapshot::from(&link);

        sqlx::query("UPDATE village_link SET status = 'unlinked', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(link.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let after = LinkSnapshot {
            status: LinkStatus::Unlinked,
            ..before.clone()
        };

        let entry = Self::insert_audit(
            &mut tx,
            village_id,
            item_kind,
            item_id,
            AuditAction::Unlink,
            Some(before),
            Some(after),
            actor,
            reason,
        )
        .await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(entry)
    }

    async fn restore(&self, entry: &AuditEntry, actor: Uuid, reason: &str) -> Result<AuditEntry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        match &entry.before_state {
            Some(snapshot) => {
                // The link existed before the mutation: put its row back.
                sqlx::query(
                    "INSERT INTO village_link
                         (id, village_id, item_kind, item_id, status, promote, priority,
                          created_by, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                     ON CONFLICT (village_id, item_kind, item_id) DO UPDATE
                     SET status = EXCLUDED.status,
                         promote = EXCLUDED.promote,
                         priority = EXCLUDED.priority,
                         created_by = EXCLUDED.created_by,
                         updated_at = EXCLUDED.updated_at",
                )
                .bind(new_v7())
                .bind(entry.village_id)
                .bind(entry.item_kind.as_str())
                .bind(entry.item_id)
                .bind(snapshot.status.as_str())
                .bind(snapshot.promote)
                .bind(snapshot.priority)
                .bind(snapshot.created_by)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            }
            None => {
                // The link did not exist before the mutation: remove it.
                sqlx::query(
                    "DELETE FROM village_link
                     WHERE village_id = $1 AND item_kind = $2 AND item_id = $3",
                )
                .bind(entry.village_id)
                .bind(entry.item_kind.as_str())
                .bind(entry.item_id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            }
        }

        let rollback_entry = Self::insert_audit(
            &mut tx,
            entry.village_id,
            entry.item_kind,
            entry.item_id,
            AuditAction::Rollback,
            entry.after_state.clone(),
            entry.before_state.clone(),
            actor,
            reason,
        )
        .await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(rollback_entry)
    }

    async fn linked_pairs(&self, village_id: Uuid) -> Result<Vec<(ItemKind, Uuid)>> {
        let rows = sqlx::query(
            "SELECT item_kind, item_id FROM village_link
             WHERE village_id = $1 AND status = 'linked'",
        )
        .bind(village_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let pairs = rows
            .into_iter()
            .filter_map(|row| {
                let kind: String = row.get("item_kind");
                ItemKind::parse(&kind).map(|k| (k, row.get("item_id")))
            })
            .collect();

        Ok(pairs)
    }

    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VillageLink>> {
        let rows = sqlx::query(
            "SELECT id, village_id, item_kind, item_id, status, promote, priority,
                    created_by, created_at, updated_at
             FROM village_link
             WHERE village_id = $1
             ORDER BY promote DESC, priority DESC, created_at ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(village_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_link_row).collect())
    }
}
