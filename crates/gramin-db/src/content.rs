//! Read-only accessors for content-management entities.
//!
//! Villages and the four candidate pools belong to the CRUD admin
//! application; this module only reads them, normalizing each pool's
//! per-kind columns into the uniform [`Candidate`] read-model.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use gramin_core::{
    Candidate, CandidateRepository, Error, ItemKind, Result, Village, VillageRepository,
};

/// PostgreSQL implementation of VillageRepository.
pub struct PgVillageRepository {
    pool: Pool<Postgres>,
}

impl PgVillageRepository {
    /// Create a new PgVillageRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_village_row(row: sqlx::postgres::PgRow) -> Village {
        Village {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            district_id: row.get("district_id"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
        }
    }
}

#[async_trait]
impl VillageRepository for PgVillageRepository {
    async fn fetch(&self, id: Uuid) -> Result<Village> {
        let row = sqlx::query(
            "SELECT id, name, slug, district_id, latitude, longitude
             FROM village WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_village_row)
            .ok_or(Error::VillageNotFound(id))
    }

    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Village>> {
        let row = sqlx::query(
            "SELECT id, name, slug, district_id, latitude, longitude
             FROM village WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_village_row))
    }
}

/// PostgreSQL implementation of CandidateRepository.
///
/// Each kind keeps its own display-name and region column in the content
/// schema; the SELECTs alias them to a common shape.
pub struct PgCandidateRepository {
    pool: Pool<Postgres>,
}

impl PgCandidateRepository {
    /// Create a new PgCandidateRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Per-kind SELECT normalizing display and region columns.
    fn pool_query(kind: ItemKind) -> &'static str {
        match kind {
            ItemKind::Provider => {
                "SELECT id, name, village_id, district_id, region_text
                 FROM provider ORDER BY created_at DESC LIMIT $1"
            }
            ItemKind::Listing => {
                "SELECT id, title AS name, village_id, district_id, location_text AS region_text
                 FROM listing ORDER BY created_at DESC LIMIT $1"
            }
            ItemKind::Package => {
                "SELECT id, title AS name, village_id, district_id, destination AS region_text
                 FROM package ORDER BY created_at DESC LIMIT $1"
            }
            ItemKind::Product => {
                "SELECT id, name, village_id, district_id, origin_text AS region_text
                 FROM product ORDER BY created_at DESC LIMIT $1"
            }
        }
    }
}

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    async fn pool(&self, kind: ItemKind, limit: i64) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(Self::pool_query(kind))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let candidates = rows
            .into_iter()
            .map(|row| Candidate {
                id: row.get("id"),
                kind,
                name: row.get("name"),
                village_id: row.get("village_id"),
                district_id: row.get("district_id"),
                region_text: row.get("region_text"),
            })
            .collect();

        Ok(candidates)
    }
}
