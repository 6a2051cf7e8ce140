//! Link-job repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use gramin_core::{
    new_v7, CreateLinkJobRequest, Error, JobStatus, LinkJob, LinkJobRepository, NewSuggestion,
    Result, ScanMode, SuggestionStatus,
};

/// PostgreSQL implementation of LinkJobRepository.
pub struct PgLinkJobRepository {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgLinkJobRepository {
    /// Create a new PgLinkJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a new PgLinkJobRepository sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Parse a job row into a LinkJob struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> LinkJob {
        let mode: String = row.get("mode");
        let status: String = row.get("status");
        LinkJob {
            id: row.get("id"),
            village_id: row.get("village_id"),
            mode: ScanMode::parse(&mode).unwrap_or(ScanMode::Fuzzy),
            radius_meters: row.get("radius_meters"),
            limit: row.get("scan_limit"),
            status: JobStatus::parse(&status).unwrap_or(JobStatus::Queued),
            created_by: row.get("created_by"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            suggestion_count: row.get("suggestion_count"),
            error_message: row.get("error_message"),
        }
    }
}

const JOB_COLUMNS: &str = "id, village_id, mode, radius_meters, scan_limit, status, created_by, \
                           created_at, started_at, completed_at, suggestion_count, error_message";

#[async_trait]
impl LinkJobRepository for PgLinkJobRepository {
    async fn create(&self, req: CreateLinkJobRequest) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO village_link_job
                 (id, village_id, mode, radius_meters, scan_limit, status, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, 'queued', $6, $7)",
        )
        .bind(job_id)
        .bind(req.village_id)
        .bind(req.mode.as_str())
        .bind(req.radius_meters)
        .bind(req.limit)
        .bind(req.created_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(job_id)
    }

    async fn claim_next(&self) -> Result<Option<LinkJob>> {
        let now = Utc::now();

        // FOR UPDATE SKIP LOCKED so concurrent workers never double-claim.
        let row = sqlx::query(&format!(
            "UPDATE village_link_job
             SET status = 'running', started_at = $1
             WHERE id = (
                 SELECT id FROM village_link_job
                 WHERE status = 'queued'
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn finish(&self, job_id: Uuid, suggestions: Vec<NewSuggestion>) -> Result<i32> {
        let now = Utc::now();
        let count = suggestions.len() as i32;

        // Batch insert + terminal transition in one transaction so a Query
        // call never observes partial suggestions for a running job.
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for suggestion in &suggestions {
            let candidate_data = serde_json::to_value(&suggestion.candidate)?;
            sqlx::query(
                "INSERT INTO village_link_suggestion
                     (id, job_id, village_id, item_kind, item_id, confidence, source,
                      candidate_data, status, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(new_v7())
            .bind(job_id)
            .bind(suggestion.village_id)
            .bind(suggestion.item_kind.as_str())
            .bind(suggestion.item_id)
            .bind(suggestion.confidence)
            .bind(suggestion.source.as_str())
            .bind(&candidate_data)
            .bind(SuggestionStatus::Pending.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        sqlx::query(
            "UPDATE village_link_job
             SET status = 'finished', completed_at = $1, suggestion_count = $2
             WHERE id = $3",
        )
        .bind(now)
        .bind(count)
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(count)
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE village_link_job
             SET status = 'failed', completed_at = $1, error_message = $2
             WHERE id = $3",
        )
        .bind(now)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<LinkJob> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM village_link_job WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).ok_or(Error::JobNotFound(id))
    }

    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LinkJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM village_link_job
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

        Ok(rows.into_iter().map(Self::parse_job_row).collect())
    }
}
