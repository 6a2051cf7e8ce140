//! Commit/rollback coordination.
//!
//! Commit turns accepted suggestions into audited link rows; rollback
//! inversely replays a prior audit entry. Each suggestion is processed
//! independently so one failure never aborts its siblings.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use gramin_core::{
    AuditEntry, AuditRepository, Error, ItemKind, Result, RoleLookup, SuggestionRepository,
    UpsertLinkRequest, VillageLinkRepository,
};

/// Result of a commit call: partial success with itemized errors.
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub committed_count: usize,
    pub errors: Vec<String>,
}

/// Coordinates audited link mutations driven by operator decisions.
#[derive(Clone)]
pub struct LinkCoordinator {
    suggestions: Arc<dyn SuggestionRepository>,
    links: Arc<dyn VillageLinkRepository>,
    audit: Arc<dyn AuditRepository>,
    roles: Arc<dyn RoleLookup>,
}

impl LinkCoordinator {
    pub fn new(
        suggestions: Arc<dyn SuggestionRepository>,
        links: Arc<dyn VillageLinkRepository>,
        audit: Arc<dyn AuditRepository>,
        roles: Arc<dyn RoleLookup>,
    ) -> Self {
        Self {
            suggestions,
            links,
            audit,
            roles,
        }
    }

    /// Commit the named suggestions of one job into link rows.
    ///
    /// Ids outside the job are ignored. Fails with `NotFound` only when
    /// none of the requested ids resolve; otherwise returns the committed
    /// count plus per-item error messages.
    #[instrument(skip(self, suggestion_ids), fields(subsystem = "linking", component = "coordinator", op = "commit", job_id = %job_id))]
    pub async fn commit(
        &self,
        job_id: Uuid,
        suggestion_ids: &[Uuid],
        actor: Uuid,
    ) -> Result<CommitOutcome> {
        let suggestions = self
            .suggestions
            .fetch_for_job(job_id, suggestion_ids)
            .await?;

        if suggestions.is_empty() {
            return Err(Error::NotFound(format!(
                "No suggestions matched the requested ids for job {job_id}"
            )));
        }

        let mut committed_count = 0;
        let mut errors = Vec::new();

        for suggestion in suggestions {
            let result = self
                .links
                .upsert_linked(UpsertLinkRequest {
                    village_id: suggestion.village_id,
                    item_kind: suggestion.item_kind,
                    item_id: suggestion.item_id,
                    promote: false,
                    priority: 0,
                    actor,
                    reason: format!("Committed from scan job {job_id}"),
                })
                .await;

            match result {
                Ok(_) => {
                    if let Err(e) = self.suggestions.mark_committed(suggestion.id).await {
                        // The link and its audit row landed; only the
                        // review-state flip was lost.
                        warn!(
                            suggestion_id = %suggestion.id,
                            error = %e,
                            "Link committed but suggestion status flip failed"
                        );
                        errors.push(format!("suggestion {}: {e}", suggestion.id));
                    } else {
                        committed_count += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        suggestion_id = %suggestion.id,
                        item_kind = suggestion.item_kind.as_str(),
                        item_id = %suggestion.item_id,
                        error = %e,
                        "Failed to commit suggestion"
                    );
                    errors.push(format!(
                        "{} {}: {e}",
                        suggestion.item_kind.as_str(),
                        suggestion.item_id
                    ));
                }
            }
        }

        info!(
            job_id = %job_id,
            committed_count,
            error_count = errors.len(),
            "Commit completed"
        );
        Ok(CommitOutcome {
            committed_count,
            errors,
        })
    }

    /// Inversely replay an audit entry. Privileged: the actor must hold
    /// super_admin, checked before any read.
    #[instrument(skip(self, reason), fields(subsystem = "linking", component = "coordinator", op = "rollback", audit_id = %audit_id))]
    pub async fn rollback(&self, audit_id: Uuid, reason: &str, actor: Uuid) -> Result<AuditEntry> {
        let role = self.roles.role_for(actor).await?;
        if !role.map(|r| r.is_super_admin()).unwrap_or(false) {
            return Err(Error::Forbidden(
                "Rollback requires super_admin".to_string(),
            ));
        }

        let entry = self.audit.fetch(audit_id).await?;
        let rollback_entry = self.links.restore(&entry, actor, reason).await?;

        info!(
            audit_id = %audit_id,
            rollback_id = %rollback_entry.id,
            village_id = %entry.village_id,
            item_kind = entry.item_kind.as_str(),
            item_id = %entry.item_id,
            "Audit entry rolled back"
        );
        Ok(rollback_entry)
    }

    /// Flip a committed link to unlinked status, with its paired audit row.
    #[instrument(skip(self, reason), fields(subsystem = "linking", component = "coordinator", op = "unlink", village_id = %village_id))]
    pub async fn unlink(
        &self,
        village_id: Uuid,
        item_kind: ItemKind,
        item_id: Uuid,
        actor: Uuid,
        reason: Option<String>,
    ) -> Result<AuditEntry> {
        let reason = reason.unwrap_or_else(|| "Unlinked by operator".to_string());
        self.links
            .unlink(village_id, item_kind, item_id, actor, &reason)
            .await
    }
}
