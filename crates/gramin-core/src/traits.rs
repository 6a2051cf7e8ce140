//! Core traits for gramin linking abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling a PostgreSQL backend in production and in-memory fakes
//! in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// READ-ONLY CONTENT ACCESS
// =============================================================================

/// Read-only access to village records, owned by the content-management
/// subsystem.
#[async_trait]
pub trait VillageRepository: Send + Sync {
    /// Fetch a village by id. Fails with `VillageNotFound`.
    async fn fetch(&self, id: Uuid) -> Result<Village>;

    /// Fetch a village by its URL slug, if it exists.
    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Village>>;
}

/// Read-only access to the four candidate pools.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Load one candidate pool, bounded by `limit` rows.
    async fn pool(&self, kind: ItemKind, limit: i64) -> Result<Vec<Candidate>>;
}

// =============================================================================
// LINK JOBS
// =============================================================================

/// Request for creating a link job.
#[derive(Debug, Clone)]
pub struct CreateLinkJobRequest {
    pub village_id: Uuid,
    pub mode: ScanMode,
    pub radius_meters: i32,
    pub limit: i32,
    pub created_by: Uuid,
}

/// Repository for link-job lifecycle and suggestion persistence.
#[async_trait]
pub trait LinkJobRepository: Send + Sync {
    /// Create a job in `queued` state and return its id.
    async fn create(&self, req: CreateLinkJobRequest) -> Result<Uuid>;

    /// Atomically claim the oldest queued job, flipping it to `running`.
    /// Returns `None` when the queue is empty.
    async fn claim_next(&self) -> Result<Option<LinkJob>>;

    /// Persist the suggestion batch and mark the job `finished` in one
    /// write. Returns the suggestion count recorded on the job.
    async fn finish(&self, job_id: Uuid, suggestions: Vec<NewSuggestion>) -> Result<i32>;

    /// Mark a job `failed` with the captured error message.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Fetch a job by id. Fails with `JobNotFound`.
    async fn fetch(&self, id: Uuid) -> Result<LinkJob>;

    /// List jobs for a village, newest first.
    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LinkJob>>;
}

/// Repository for reviewing and committing suggestions.
#[async_trait]
pub trait SuggestionRepository: Send + Sync {
    /// All suggestions for a job, ordered by descending confidence.
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<Suggestion>>;

    /// Resolve the named suggestion ids scoped to `job_id`; ids outside the
    /// job silently drop out of the result.
    async fn fetch_for_job(&self, job_id: Uuid, ids: &[Uuid]) -> Result<Vec<Suggestion>>;

    /// Flip a suggestion to `committed`.
    async fn mark_committed(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// LINKS AND AUDIT
// =============================================================================

/// Request for an audited link upsert.
#[derive(Debug, Clone)]
pub struct UpsertLinkRequest {
    pub village_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub promote: bool,
    pub priority: i32,
    pub actor: Uuid,
    pub reason: String,
}

/// Repository for committed village links.
///
/// Every mutating method pairs the link write with exactly one audit entry
/// inside a single transaction; that pairing is the one cross-entity
/// invariant this core enforces.
#[async_trait]
pub trait VillageLinkRepository: Send + Sync {
    /// Upsert a link to `linked` status keyed by (village_id, item_kind,
    /// item_id). The audit action is `Link` when no row existed before and
    /// `Update` otherwise. Returns the appended audit entry.
    async fn upsert_linked(&self, req: UpsertLinkRequest) -> Result<AuditEntry>;

    /// Flip an existing link to `unlinked` status. Fails with `NotFound`
    /// when no link row exists for the key.
    async fn unlink(
        &self,
        village_id: Uuid,
        item_kind: ItemKind,
        item_id: Uuid,
        actor: Uuid,
        reason: &str,
    ) -> Result<AuditEntry>;

    /// Inverse-replay an audit entry: restore `before_state` when present,
    /// or hard-remove the link row when it is null. Appends a `Rollback`
    /// audit entry (before = entry.after_state, after = entry.before_state)
    /// in the same transaction and returns it.
    async fn restore(&self, entry: &AuditEntry, actor: Uuid, reason: &str) -> Result<AuditEntry>;

    /// The (item_kind, item_id) pairs currently linked to a village, used
    /// by the job runner to suppress duplicate suggestions.
    async fn linked_pairs(&self, village_id: Uuid) -> Result<Vec<(ItemKind, Uuid)>>;

    /// List link rows for a village, promoted first, then by priority.
    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VillageLink>>;
}

/// Read access to the append-only audit ledger. Writes happen only inside
/// `VillageLinkRepository` transactions.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Fetch an audit entry by id. Fails with `AuditNotFound`.
    async fn fetch(&self, id: Uuid) -> Result<AuditEntry>;

    /// List audit entries for a village, newest first.
    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditEntry>>;
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Identity/role lookup consumed from the auth collaborator, keyed by an
/// opaque admin-user id.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    /// Resolve the role for a user id; `None` when the user is unknown.
    async fn role_for(&self, user_id: Uuid) -> Result<Option<Role>>;
}
