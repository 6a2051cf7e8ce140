//! # gramin-db
//!
//! PostgreSQL database layer for the gramin linking service.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for jobs, suggestions, links, and audit
//! - Read-only accessors for the content-management tables
//!
//! ## Example
//!
//! ```rust,ignore
//! use gramin_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/gramin").await?;
//!     let job = db.jobs.fetch(job_id).await?;
//!     println!("job status: {:?}", job.status);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod content;
pub mod jobs;
pub mod links;
pub mod pool;
pub mod roles;
pub mod suggestions;

// Re-export core types
pub use gramin_core::*;

// Re-export repository implementations
pub use audit::PgAuditRepository;
pub use content::{PgCandidateRepository, PgVillageRepository};
pub use jobs::PgLinkJobRepository;
pub use links::PgVillageLinkRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use roles::PgRoleLookup;
pub use suggestions::PgSuggestionRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Read-only village accessor.
    pub villages: std::sync::Arc<PgVillageRepository>,
    /// Read-only candidate pool accessor.
    pub candidates: std::sync::Arc<PgCandidateRepository>,
    /// Link-job lifecycle and suggestion persistence.
    pub jobs: std::sync::Arc<PgLinkJobRepository>,
    /// Suggestion review and commit flips.
    pub suggestions: std::sync::Arc<PgSuggestionRepository>,
    /// Audited link mutations.
    pub links: std::sync::Arc<PgVillageLinkRepository>,
    /// Audit ledger read access.
    pub audit: std::sync::Arc<PgAuditRepository>,
    /// Identity/role lookup.
    pub roles: std::sync::Arc<PgRoleLookup>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            villages: self.villages.clone(),
            candidates: self.candidates.clone(),
            jobs: self.jobs.clone(),
            suggestions: self.suggestions.clone(),
            links: self.links.clone(),
            audit: self.audit.clone(),
            roles: self.roles.clone(),
        }
    }
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_config(database_url, PoolConfig::default()).await
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build the repository set over an existing pool.
    pub fn from_pool(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        use std::sync::Arc;
        Self {
            villages: Arc::new(PgVillageRepository::new(pool.clone())),
            candidates: Arc::new(PgCandidateRepository::new(pool.clone())),
            jobs: Arc::new(PgLinkJobRepository::new(pool.clone())),
            suggestions: Arc::new(PgSuggestionRepository::new(pool.clone())),
            links: Arc::new(PgVillageLinkRepository::new(pool.clone())),
            audit: Arc::new(PgAuditRepository::new(pool.clone())),
            roles: Arc::new(PgRoleLookup::new(pool.clone())),
            pool,
        }
    }

    /// Run embedded schema migrations (requires the `migrations` feature).
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {e}")))?;
        Ok(())
    }
}
