//! # gramin-linking
//!
//! The entity auto-linking service: scan jobs, the background worker,
//! commit/rollback coordination, and bulk import.
//!
//! ## Example
//!
//! ```ignore
//! use gramin_linking::{MemoryCooldownStore, ScanService, ScanWorker, WorkerConfig};
//! use gramin_db::Database;
//! use std::sync::Arc;
//!
//! let db = Database::connect("postgres://...").await?;
//! let scans = ScanService::new(
//!     db.villages.clone(),
//!     db.candidates.clone(),
//!     db.jobs.clone(),
//!     db.suggestions.clone(),
//!     db.links.clone(),
//!     Arc::new(MemoryCooldownStore::new()),
//! );
//!
//! let handle = ScanWorker::new(scans, WorkerConfig::from_env())
//!     .with_wake(db.jobs.job_notify())
//!     .start();
//!
//! // ... serve requests ...
//! handle.shutdown().await?;
//! ```

pub mod commit;
pub mod cooldown;
pub mod import;
pub mod scan;
pub mod worker;

// Re-export core types
pub use gramin_core::*;

pub use commit::{CommitOutcome, LinkCoordinator};
pub use cooldown::{CooldownStore, MemoryCooldownStore};
pub use import::{BulkImporter, ImportItem, ImportReport, ImportRowError};
pub use scan::{ScanService, TriggerScanRequest};
pub use worker::{ScanWorker, WorkerConfig, WorkerEvent, WorkerHandle};
