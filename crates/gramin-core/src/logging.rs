//! Structured logging schema and field name constants for gramin.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (candidates, scores) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "linking", "match"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "scan_worker", "coordinator", "bulk_import", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "trigger_scan", "commit", "rollback", "claim_next"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Village UUID being scanned or linked.
pub const VILLAGE_ID: &str = "village_id";

/// Link job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Candidate item kind ("provider", "listing", "package", "product").
pub const ITEM_KIND: &str = "item_kind";

/// Candidate item UUID.
pub const ITEM_ID: &str = "item_id";

/// Audit entry UUID.
pub const AUDIT_ID: &str = "audit_id";

/// Actor (admin user) performing the mutation.
pub const ACTOR: &str = "actor";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of suggestions produced by a scan.
pub const SUGGESTION_COUNT: &str = "suggestion_count";

/// Number of candidates examined in one pool pass.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of links committed by one commit call.
pub const COMMITTED_COUNT: &str = "committed_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
