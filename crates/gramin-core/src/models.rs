//! Domain models for the village auto-linking core.
//!
//! Read-only content entities (villages and the four candidate kinds) are
//! owned by the content-management subsystem; this core only consumes them.
//! Jobs, suggestions, links, and audit entries are owned here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// READ-ONLY CONTENT ENTITIES
// =============================================================================

/// The anchor content entity being enriched with associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Village {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub district_id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Kind discriminant for the four candidate entity pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Provider,
    Listing,
    Package,
    Product,
}

impl ItemKind {
    /// All four kinds, in scan order. Passes are order-independent; this
    /// ordering only fixes iteration.
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Provider,
        ItemKind::Listing,
        ItemKind::Package,
        ItemKind::Product,
    ];

    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Provider => "provider",
            ItemKind::Listing => "listing",
            ItemKind::Package => "package",
            ItemKind::Product => "product",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown kinds so
    /// bulk-import validation can report per-row errors.
    pub fn parse(s: &str) -> Option<ItemKind> {
        match s {
            "provider" => Some(ItemKind::Provider),
            "listing" => Some(ItemKind::Listing),
            "package" => Some(ItemKind::Package),
            "product" => Some(ItemKind::Product),
            _ => None,
        }
    }
}

/// Uniform read-model each of the four candidate pools maps into.
///
/// `village_id`/`district_id`/`region_text` are the locality hints the
/// scorer consults; any of them may be absent on a given source row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub kind: ItemKind,
    pub name: String,
    pub village_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub region_text: Option<String>,
}

// =============================================================================
// LINK JOB
// =============================================================================

/// Matching mode for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Fuzzy,
    Geo,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Fuzzy => "fuzzy",
            ScanMode::Geo => "geo",
        }
    }

    pub fn parse(s: &str) -> Option<ScanMode> {
        match s {
            "fuzzy" => Some(ScanMode::Fuzzy),
            "geo" => Some(ScanMode::Geo),
            _ => None,
        }
    }
}

/// Lifecycle state of a link job. Terminal states (Finished, Failed) are
/// final; a terminated job is only ever re-triggered as a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "finished" => Some(JobStatus::Finished),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// One scan execution for a village.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkJob {
    pub id: Uuid,
    pub village_id: Uuid,
    pub mode: ScanMode,
    pub radius_meters: i32,
    pub limit: i32,
    pub status: JobStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub suggestion_count: Option<i32>,
    pub error_message: Option<String>,
}

// =============================================================================
// SUGGESTION
// =============================================================================

/// Review state of a suggestion. Created Pending by the job runner; flipped
/// to Committed by the coordinator. Never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Committed,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Committed => "committed",
        }
    }

    pub fn parse(s: &str) -> Option<SuggestionStatus> {
        match s {
            "pending" => Some(SuggestionStatus::Pending),
            "committed" => Some(SuggestionStatus::Committed),
            _ => None,
        }
    }
}

/// Denormalized display snapshot of the candidate at scan time.
///
/// Persisted as JSONB on the suggestion row so review screens never join
/// back to the (mutable) content tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub name: String,
    pub village_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub region_text: Option<String>,
}

impl From<&Candidate> for CandidateSnapshot {
    fn from(c: &Candidate) -> Self {
        Self {
            name: c.name.clone(),
            village_id: c.village_id,
            district_id: c.district_id,
            region_text: c.region_text.clone(),
        }
    }
}

/// A scored candidate awaiting operator approval, produced by one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Uuid,
    pub job_id: Uuid,
    pub village_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub confidence: f32,
    pub source: ScanMode,
    pub candidate: CandidateSnapshot,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
}

/// A suggestion as collected during a scan, before the batch write assigns
/// ids and timestamps.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub village_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub confidence: f32,
    pub source: ScanMode,
    pub candidate: CandidateSnapshot,
}

// =============================================================================
// VILLAGE LINK
// =============================================================================

/// Committed-association status. Unlink is a status flip, never a DELETE,
/// so audit rollback always has a concrete prior row to restore or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Linked,
    Unlinked,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Linked => "linked",
            LinkStatus::Unlinked => "unlinked",
        }
    }

    pub fn parse(s: &str) -> Option<LinkStatus> {
        match s {
            "linked" => Some(LinkStatus::Linked),
            "unlinked" => Some(LinkStatus::Unlinked),
            _ => None,
        }
    }
}

/// The committed many-to-many association between a village and a typed
/// target entity. At most one row per (village_id, item_kind, item_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillageLink {
    pub id: Uuid,
    pub village_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub status: LinkStatus,
    pub promote: bool,
    pub priority: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The operator-settable portion of a link row, captured before and after
/// every mutation. Sufficient to invert the mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub status: LinkStatus,
    pub promote: bool,
    pub priority: i32,
    pub created_by: Uuid,
}

impl From<&VillageLink> for LinkSnapshot {
    fn from(link: &VillageLink) -> Self {
        Self {
            status: link.status,
            promote: link.promote,
            priority: link.priority,
            created_by: link.created_by,
        }
    }
}

// =============================================================================
// AUDIT
// =============================================================================

/// Kind of link mutation recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A link was created where none existed (before_state is null).
    Link,
    /// An existing link row was updated (re-link, promote/priority change).
    Update,
    /// A link was flipped to unlinked status.
    Unlink,
    /// A prior entry was inversely replayed.
    Rollback,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Link => "link",
            AuditAction::Update => "update",
            AuditAction::Unlink => "unlink",
            AuditAction::Rollback => "rollback",
        }
    }

    pub fn parse(s: &str) -> Option<AuditAction> {
        match s {
            "link" => Some(AuditAction::Link),
            "update" => Some(AuditAction::Update),
            "unlink" => Some(AuditAction::Unlink),
            "rollback" => Some(AuditAction::Rollback),
            _ => None,
        }
    }
}

/// Append-only ledger row. Every link mutation is paired with exactly one
/// audit entry in the same logical operation; rollback appends rather than
/// mutating history, so the ledger grows monotonically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub village_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub action: AuditAction,
    pub before_state: Option<LinkSnapshot>,
    pub after_state: Option<LinkSnapshot>,
    pub changed_by: Uuid,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ROLES
// =============================================================================

/// Role tiers consumed from the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    ContentManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::ContentManager => "content_manager",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "admin" => Some(Role::Admin),
            "content_manager" => Some(Role::ContentManager),
            _ => None,
        }
    }

    /// Admin tier covers all three roles; scans, commits, and imports
    /// require it.
    pub fn is_admin_tier(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin | Role::ContentManager)
    }

    /// Rollback requires the highest tier.
    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }
}
