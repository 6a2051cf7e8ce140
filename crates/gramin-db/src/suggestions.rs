//! Suggestion repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use gramin_core::{
    CandidateSnapshot, Error, ItemKind, Result, ScanMode, Suggestion, SuggestionRepository,
    SuggestionStatus,
};

/// PostgreSQL implementation of SuggestionRepository.
pub struct PgSuggestionRepository {
    pool: Pool<Postgres>,
}

impl PgSuggestionRepository {
    /// Create a new PgSuggestionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a suggestion row, including the JSONB candidate snapshot.
    fn parse_suggestion_row(row: sqlx::postgres::PgRow) -> Result<Suggestion> {
        let item_kind: String = row.get("item_kind");
        let source: String = row.get("source");
        let status: String = row.get("status");
        let candidate_data: serde_json::Value = row.get("candidate_data");
        let candidate: CandidateSnapshot = serde_json::from_value(candidate_data)?;

        Ok(Suggestion {
            id: row.get("id"),
            job_id: row.get("job_id"),
            village_id: row.get("village_id"),
            item_kind: ItemKind::parse(&item_kind)
                .ok_or_else(|| Error::Internal(format!("Unknown item_kind: {item_kind}")))?,
            item_id: row.get("item_id"),
            confidence: row.get("confidence"),
            source: ScanMode::parse(&source).unwrap_or(ScanMode::Fuzzy),
            candidate,
            status: SuggestionStatus::parse(&status).unwrap_or(SuggestionStatus::Pending),
            created_at: row.get("created_at"),
        })
    }
}

const SUGGESTION_COLUMNS: &str = "id, job_id, village_id, item_kind, item_id, confidence, source, \
                                  candidate_data, status, created_at";

#[async_trait]
impl SuggestionRepository for PgSuggestionRepository {
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM village_link_suggestion
             WHERE job_id = $1
             ORDER BY confidence DESC, created_at ASC"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_suggestion_row).collect()
    }

    async fn fetch_for_job(&self, job_id: Uuid, ids: &[Uuid]) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM village_link_suggestion
             WHERE job_id = $1 AND id = ANY($2)
             ORDER BY confidence DESC"
        ))
        .bind(job_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_suggestion_row).collect()
    }

    async fn mark_committed(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE village_link_suggestion SET status = 'committed' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
