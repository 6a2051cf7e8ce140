//! # gramin-core
//!
//! Core types, traits, and abstractions for the gramin village platform's
//! entity auto-linking service.
//!
//! This crate provides:
//! - Domain models (jobs, suggestions, links, audit entries)
//! - Repository traits implemented by `gramin-db` and by test fakes
//! - The shared error type and result alias
//! - Centralized default constants and logging field names

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::{
    AuditAction, AuditEntry, Candidate, CandidateSnapshot, ItemKind, JobStatus, LinkJob,
    LinkSnapshot, LinkStatus, NewSuggestion, Role, ScanMode, Suggestion, SuggestionStatus, Village,
    VillageLink,
};
pub use traits::{
    AuditRepository, CandidateRepository, CreateLinkJobRequest, LinkJobRepository, RoleLookup,
    SuggestionRepository, UpsertLinkRequest, VillageLinkRepository, VillageRepository,
};
pub use uuid_utils::new_v7;
