//! In-memory fakes for exercising the linking pipeline without Postgres.
//!
//! One `InMemoryStore` implements every repository trait over
//! Mutex-protected collections, mirroring the transactional semantics the
//! Pg implementations provide (audit pairing, created_by preservation,
//! unlink-as-status-flip).

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use gramin_linking::{
    new_v7, AuditAction, AuditEntry, AuditRepository, Candidate, CandidateRepository,
    CreateLinkJobRequest, Error, ItemKind, JobStatus, LinkJob, LinkJobRepository, LinkSnapshot,
    LinkStatus, NewSuggestion, Result, Role, RoleLookup, ScanMode, Suggestion,
    SuggestionRepository, SuggestionStatus, UpsertLinkRequest, Village, VillageLink,
    VillageLinkRepository, VillageRepository,
};

#[derive(Default)]
pub struct InMemoryStore {
    pub villages: Mutex<HashMap<Uuid, Village>>,
    pub candidates: Mutex<HashMap<ItemKind, Vec<Candidate>>>,
    pub jobs: Mutex<HashMap<Uuid, LinkJob>>,
    pub suggestions: Mutex<Vec<Suggestion>>,
    pub links: Mutex<Vec<VillageLink>>,
    pub audit: Mutex<Vec<AuditEntry>>,
    pub roles: Mutex<HashMap<Uuid, Role>>,
    /// When set, `finish` fails to simulate a batch-write error.
    pub fail_finish: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_village(&self, name: &str) -> Village {
        let village = Village {
            id: new_v7(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            district_id: new_v7(),
            latitude: None,
            longitude: None,
        };
        self.villages
            .lock()
            .unwrap()
            .insert(village.id, village.clone());
        village
    }

    pub fn add_candidate(&self, kind: ItemKind, candidate: Candidate) {
        self.candidates
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(candidate);
    }

    pub fn add_user(&self, role: Role) -> Uuid {
        let id = new_v7();
        self.roles.lock().unwrap().insert(id, role);
        id
    }

    pub fn audit_count_for_item(&self, village_id: Uuid, item_id: Uuid) -> usize {
        self.audit
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.village_id == village_id && e.item_id == item_id)
            .count()
    }

    pub fn link_for(&self, village_id: Uuid, kind: ItemKind, item_id: Uuid) -> Option<VillageLink> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.village_id == village_id && l.item_kind == kind && l.item_id == item_id)
            .cloned()
    }
}

/// Build a candidate with only a name (no locality hints).
pub fn candidate(kind: ItemKind, name: &str) -> Candidate {
    Candidate {
        id: new_v7(),
        kind,
        name: name.to_string(),
        village_id: None,
        district_id: None,
        region_text: None,
    }
}

#[async_trait]
impl VillageRepository for InMemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<Village> {
        self.villages
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::VillageNotFound(id))
    }

    async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Village>> {
        Ok(self
            .villages
            .lock()
            .unwrap()
            .values()
            .find(|v| v.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl CandidateRepository for InMemoryStore {
    async fn pool(&self, kind: ItemKind, limit: i64) -> Result<Vec<Candidate>> {
        let pools = self.candidates.lock().unwrap();
        Ok(pools
            .get(&kind)
            .map(|v| v.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LinkJobRepository for InMemoryStore {
    async fn create(&self, req: CreateLinkJobRequest) -> Result<Uuid> {
        let job = LinkJob {
            id: new_v7(),
            village_id: req.village_id,
            mode: req.mode,
            radius_meters: req.radius_meters,
            limit: req.limit,
            status: JobStatus::Queued,
            created_by: req.created_by,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            suggestion_count: None,
            error_message: None,
        };
        let id = job.id;
        self.jobs.lock().unwrap().insert(id, job);
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<LinkJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut queued: Vec<&mut LinkJob> = jobs
            .values_mut()
            .filter(|j| j.status == JobStatus::Queued)
            .collect();
        queued.sort_by_key(|j| j.created_at);
        if let Some(job) = queued.into_iter().next() {
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn finish(&self, job_id: Uuid, suggestions: Vec<NewSuggestion>) -> Result<i32> {
        if self.fail_finish.load(Ordering::SeqCst) {
            return Err(Error::Internal("simulated batch write failure".into()));
        }
        let now = Utc::now();
        let count = suggestions.len() as i32;

        let mut stored = self.suggestions.lock().unwrap();
        for s in suggestions {
            stored.push(Suggestion {
                id: new_v7(),
                job_id,
                village_id: s.village_id,
                item_kind: s.item_kind,
                item_id: s.item_id,
                confidence: s.confidence,
                source: s.source,
                candidate: s.candidate,
                status: SuggestionStatus::Pending,
                created_at: now,
            });
        }
        drop(stored);

        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or(Error::JobNotFound(job_id))?;
        job.status = JobStatus::Finished;
        job.completed_at = Some(now);
        job.suggestion_count = Some(count);
        Ok(count)
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or(Error::JobNotFound(job_id))?;
        job.status = JobStatus::Failed;
        job.completed_at = Some(Utc::now());
        job.error_message = Some(error.to_string());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<LinkJob> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::JobNotFound(id))
    }

    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LinkJob>> {
        let mut jobs: Vec<LinkJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.village_id == village_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl SuggestionRepository for InMemoryStore {
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<Suggestion>> {
        let mut result: Vec<Suggestion> = self
            .suggestions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.job_id == job_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        Ok(result)
    }

    async fn fetch_for_job(&self, job_id: Uuid, ids: &[Uuid]) -> Result<Vec<Suggestion>> {
        Ok(self
            .suggestions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.job_id == job_id && ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn mark_committed(&self, id: Uuid) -> Result<()> {
        let mut suggestions = self.suggestions.lock().unwrap();
        let suggestion = suggestions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::NotFound(format!("Suggestion {id}")))?;
        suggestion.status = SuggestionStatus::Committed;
        Ok(())
    }
}

#[async_trait]
impl VillageLinkRepository for InMemoryStore {
    async fn upsert_linked(&self, req: UpsertLinkRequest) -> Result<AuditEntry> {
        let now = Utc::now();
        let mut links = self.links.lock().unwrap();

        let existing = links.iter_mut().find(|l| {
            l.village_id == req.village_id
                && l.item_kind == req.item_kind
                && l.item_id == req.item_id
        });

        let (action, before_state, after_state) = match existing {
            Some(link) => {
                let before = LinkSnapshot::from(&*link);
                link.status = LinkStatus::Linked;
                link.promote = req.promote;
                link.priority = req.priority;
                link.updated_at = now;
                let after = LinkSnapshot::from(&*link);
                (AuditAction::Update, Some(before), Some(after))
            }
            None => {
                let link = VillageLink {
                    id: new_v7(),
                    village_id: req.village_id,
                    item_kind: req.item_kind,
                    item_id: req.item_id,
                    status: LinkStatus::Linked,
                    promote: req.promote,
                    priority: req.priority,
                    created_by: req.actor,
                    created_at: now,
                    updated_at: now,
                };
                let after = LinkSnapshot::from(&link);
                links.push(link);
                (AuditAction::Link, None, Some(after))
            }
        };
        drop(links);

        let entry = AuditEntry {
            id: new_v7(),
            village_id: req.village_id,
            item_kind: req.item_kind,
            item_id: req.item_id,
            action,
            before_state,
            after_state,
            changed_by: req.actor,
            reason: req.reason,
            created_at: now,
        };
        self.audit.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn unlink(
        &self,
        village_id: Uuid,
        item_kind: ItemKind,
        item_id: Uuid,
        actor: Uuid,
        reason: &str,
    ) -> Result<AuditEntry> {
        let now = Utc::now();
        let mut links = self.links.lock().unwrap();
        let link = links
            .iter_mut()
            .find(|l| {
                l.village_id == village_id && l.item_kind == item_kind && l.item_id == item_id
            })
            .ok_or_else(|| {
                Error::NotFound(format!("Link ({village_id}, {}, {item_id})", item_kind.as_str()))
            })?;

        let before = LinkSnapshot::from(&*link);
        link.status = LinkStatus::Unlinked;
        link.updated_at = now;
        let after = LinkSnapshot::from(&*link);
        drop(links);

        let entry = AuditEntry {
            id: new_v7(),
            village_id,
            item_kind,
            item_id,
            action: AuditAction::Unlink,
            before_state: Some(before),
            after_state: Some(after),
            changed_by: actor,
            reason: reason.to_string(),
            created_at: now,
        };
        self.audit.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn restore(&self, entry: &AuditEntry, actor: Uuid, reason: &str) -> Result<AuditEntry> {
        let now = Utc::now();
        let mut links = self.links.lock().unwrap();

        match &entry.before_state {
            Some(snapshot) => {
                let existing = links.iter_mut().find(|l| {
                    l.village_id == entry.village_id
                        && l.item_kind == entry.item_kind
                        && l.item_id == entry.item_id
                });
                match existing {
                    Some(link) => {
                        link.status = snapshot.status;
                        link.promote = snapshot.promote;
                        link.priority = snapshot.priority;
                        link.created_by = snapshot.created_by;
                        link.updated_at = now;
                    }
                    None => {
                        links.push(VillageLink {
                            id: new_v7(),
                            village_id: entry.village_id,
                            item_kind: entry.item_kind,
                            item_id: entry.item_id,
                            status: snapshot.status,
                            promote: snapshot.promote,
                            priority: snapshot.priority,
                            created_by: snapshot.created_by,
                            created_at: now,
                            updated_at: now,
                        });
                    }
                }
            }
            None => {
                links.retain(|l| {
                    !(l.village_id == entry.village_id
                        && l.item_kind == entry.item_kind
                        && l.item_id == entry.item_id)
                });
            }
        }
        drop(links);

        let rollback_entry = AuditEntry {
            id: new_v7(),
            village_id: entry.village_id,
            item_kind: entry.item_kind,
            item_id: entry.item_id,
            action: AuditAction::Rollback,
            before_state: entry.after_state.clone(),
            after_state: entry.before_state.clone(),
            changed_by: actor,
            reason: reason.to_string(),
            created_at: now,
        };
        self.audit.lock().unwrap().push(rollback_entry.clone());
        Ok(rollback_entry)
    }

    async fn linked_pairs(&self, village_id: Uuid) -> Result<Vec<(ItemKind, Uuid)>> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.village_id == village_id && l.status == LinkStatus::Linked)
            .map(|l| (l.item_kind, l.item_id))
            .collect())
    }

    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VillageLink>> {
        let mut result: Vec<VillageLink> = self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.village_id == village_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.promote
                .cmp(&a.promote)
                .then(b.priority.cmp(&a.priority))
        });
        Ok(result
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl AuditRepository for InMemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<AuditEntry> {
        self.audit
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(Error::AuditNotFound(id))
    }

    async fn list_for_village(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditEntry>> {
        let mut result: Vec<AuditEntry> = self
            .audit
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.village_id == village_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl RoleLookup for InMemoryStore {
    async fn role_for(&self, user_id: Uuid) -> Result<Option<Role>> {
        Ok(self.roles.lock().unwrap().get(&user_id).copied())
    }
}

/// Assemble a ScanService over the shared store with a fresh cooldown map.
pub fn scan_service(store: &Arc<InMemoryStore>) -> gramin_linking::ScanService {
    gramin_linking::ScanService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(gramin_linking::MemoryCooldownStore::new()),
    )
}

/// Assemble a LinkCoordinator over the shared store.
pub fn coordinator(store: &Arc<InMemoryStore>) -> gramin_linking::LinkCoordinator {
    gramin_linking::LinkCoordinator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    )
}

/// Trigger a scan and run the claimed job to completion, returning the
/// finished job id.
pub async fn trigger_and_run(
    store: &Arc<InMemoryStore>,
    scans: &gramin_linking::ScanService,
    village_id: Uuid,
    mode: ScanMode,
    actor: Uuid,
) -> Uuid {
    let job_id = scans
        .trigger(gramin_linking::TriggerScanRequest {
            village_id,
            mode,
            radius_meters: None,
            limit: None,
            actor,
        })
        .await
        .expect("trigger should succeed");

    let job = store.claim_next().await.unwrap().expect("job queued");
    assert_eq!(job.id, job_id);
    scans.execute(job).await;
    job_id
}
