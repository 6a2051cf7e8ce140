//! Centralized default constants for the gramin linking service.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates reference these constants instead of defining their own magic
//! numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// SCANNING
// =============================================================================

/// Minimum interval between successive scan triggers for the same village.
///
/// Keyed per village_id; a second trigger inside the window is rejected with
/// a rate-limit error, not queued.
pub const SCAN_COOLDOWN_SECS: u64 = 600;

/// Confidence cutoff below which a scored candidate is not persisted as a
/// suggestion. Tunable constant, not derived.
pub const SUGGESTION_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// Default per-pool row bound for one scan (providers, listings, packages,
/// products each fetch at most this many candidates).
pub const SCAN_POOL_LIMIT: i32 = 200;

/// Default geo-mode radius in meters. Accepted and persisted on the job;
/// scoring currently degrades to district equality (see gramin-match).
pub const SCAN_RADIUS_METERS: i32 = 5000;

/// Wall-clock timeout for a single scan job execution.
pub const SCAN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// WORKER
// =============================================================================

/// Polling interval when the job queue is empty (milliseconds).
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Maximum scan jobs processed concurrently by one worker.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// BULK IMPORT
// =============================================================================

/// Maximum rows accepted in a single bulk-import request. Oversize batches
/// are rejected before any row is applied.
pub const BULK_IMPORT_MAX_ROWS: usize = 500;

/// Audit reason recorded for every bulk-imported link.
pub const BULK_IMPORT_REASON: &str = "Bulk import";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints (links, jobs, audit trail).
pub const PAGE_LIMIT: i64 = 50;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default maximum request body size in bytes (bulk import payloads).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// ENVIRONMENT OVERRIDES
// =============================================================================

/// Scan cooldown seconds, overridable via `GRAMIN_SCAN_COOLDOWN_SECS`.
pub fn scan_cooldown_secs() -> u64 {
    std::env::var("GRAMIN_SCAN_COOLDOWN_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SCAN_COOLDOWN_SECS)
}

/// Per-pool scan limit, overridable via `GRAMIN_SCAN_POOL_LIMIT`.
pub fn scan_pool_limit() -> i32 {
    std::env::var("GRAMIN_SCAN_POOL_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SCAN_POOL_LIMIT)
}
