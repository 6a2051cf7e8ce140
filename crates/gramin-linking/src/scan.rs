//! Suggestion scan service: trigger, execution, and status query.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

use gramin_core::{
    defaults, CandidateRepository, CandidateSnapshot, CreateLinkJobRequest, Error, ItemKind,
    LinkJob, LinkJobRepository, NewSuggestion, Result, ScanMode, Suggestion, SuggestionRepository,
    VillageLinkRepository, VillageRepository,
};

use crate::cooldown::CooldownStore;

/// Request to trigger a scan for a village.
#[derive(Debug, Clone)]
pub struct TriggerScanRequest {
    pub village_id: Uuid,
    pub mode: ScanMode,
    /// Reserved for true geo-distance scoring; persisted on the job.
    pub radius_meters: Option<i32>,
    /// Per-pool candidate bound.
    pub limit: Option<i32>,
    pub actor: Uuid,
}

/// Scan orchestration: creates jobs behind the per-village cooldown and
/// runs claimed jobs to a terminal state.
#[derive(Clone)]
pub struct ScanService {
    villages: Arc<dyn VillageRepository>,
    candidates: Arc<dyn CandidateRepository>,
    jobs: Arc<dyn LinkJobRepository>,
    suggestions: Arc<dyn SuggestionRepository>,
    links: Arc<dyn VillageLinkRepository>,
    cooldown: Arc<dyn CooldownStore>,
}

impl ScanService {
    pub fn new(
        villages: Arc<dyn VillageRepository>,
        candidates: Arc<dyn CandidateRepository>,
        jobs: Arc<dyn LinkJobRepository>,
        suggestions: Arc<dyn SuggestionRepository>,
        links: Arc<dyn VillageLinkRepository>,
        cooldown: Arc<dyn CooldownStore>,
    ) -> Self {
        Self {
            villages,
            candidates,
            jobs,
            suggestions,
            links,
            cooldown,
        }
    }

    /// Create a queued job for the village, enforcing the cooldown.
    ///
    /// Returns the job id immediately; execution happens on the worker.
    /// A second trigger for the same village inside the window fails with
    /// `RateLimited` reporting the remaining wait in whole minutes.
    #[instrument(skip(self, req), fields(subsystem = "linking", component = "scan", op = "trigger", village_id = %req.village_id))]
    pub async fn trigger(&self, req: TriggerScanRequest) -> Result<Uuid> {
        // Validate the village before consuming the cooldown slot.
        let village = self.villages.fetch(req.village_id).await?;

        let window = Duration::from_secs(defaults::scan_cooldown_secs());
        if let Some(remaining) = self.cooldown.try_acquire(req.village_id, window) {
            let retry_after_mins = ((remaining.as_secs() + 59) / 60).max(1) as i64;
            debug!(
                village_id = %req.village_id,
                retry_after_mins,
                "Scan trigger rejected by cooldown"
            );
            return Err(Error::RateLimited { retry_after_mins });
        }

        let job_id = self
            .jobs
            .create(CreateLinkJobRequest {
                village_id: req.village_id,
                mode: req.mode,
                radius_meters: req.radius_meters.unwrap_or(defaults::SCAN_RADIUS_METERS),
                limit: req.limit.unwrap_or_else(defaults::scan_pool_limit),
                created_by: req.actor,
            })
            .await?;

        info!(
            job_id = %job_id,
            village_id = %req.village_id,
            village = %village.name,
            mode = req.mode.as_str(),
            "Scan job queued"
        );
        Ok(job_id)
    }

    /// Run a claimed job to a terminal state.
    ///
    /// Any execution error is absorbed into the job record (`failed` +
    /// error_message); it is never surfaced to the trigger caller, who
    /// already received the job id. Returns the suggestion count on
    /// success, `None` when the job was marked failed.
    #[instrument(skip(self, job), fields(subsystem = "linking", component = "scan", op = "execute", job_id = %job.id))]
    pub async fn execute(&self, job: LinkJob) -> Option<i32> {
        let job_id = job.id;
        match self.run_scan(&job).await {
            Ok(count) => Some(count),
            Err(e) => {
                let message = e.to_string();
                if let Err(fail_err) = self.jobs.fail(job_id, &message).await {
                    // The job must not stick in `running`; if even the fail
                    // write is lost the error is all we can surface.
                    tracing::error!(
                        job_id = %job_id,
                        error = %fail_err,
                        original_error = %message,
                        "Failed to mark scan job as failed"
                    );
                }
                None
            }
        }
    }

    /// The scan body: score all four pools and persist the batch.
    async fn run_scan(&self, job: &LinkJob) -> Result<i32> {
        let start = Instant::now();
        let village = self.villages.fetch(job.village_id).await?;

        // Already-linked pairs are suppressed within this job.
        let linked: HashSet<(ItemKind, Uuid)> = self
            .links
            .linked_pairs(job.village_id)
            .await?
            .into_iter()
            .collect();

        let mut batch: Vec<NewSuggestion> = Vec::new();

        for kind in ItemKind::ALL {
            let pool = self.candidates.pool(kind, job.limit as i64).await?;
            debug!(
                job_id = %job.id,
                item_kind = kind.as_str(),
                candidate_count = pool.len(),
                "Scoring candidate pool"
            );

            for candidate in &pool {
                if linked.contains(&(kind, candidate.id)) {
                    continue;
                }
                let confidence = gramin_match::score(job.mode, &village, candidate);
                if confidence <= defaults::SUGGESTION_CONFIDENCE_THRESHOLD {
                    continue;
                }
                trace!(
                    item_kind = kind.as_str(),
                    item_id = %candidate.id,
                    confidence,
                    "Candidate above threshold"
                );
                batch.push(NewSuggestion {
                    village_id: job.village_id,
                    item_kind: kind,
                    item_id: candidate.id,
                    confidence,
                    source: job.mode,
                    candidate: CandidateSnapshot::from(candidate),
                });
            }
        }

        let count = self.jobs.finish(job.id, batch).await?;

        info!(
            job_id = %job.id,
            village_id = %job.village_id,
            suggestion_count = count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Scan finished"
        );
        Ok(count)
    }

    /// Fetch a job and its suggestions, ordered by descending confidence.
    pub async fn get_job(&self, job_id: Uuid) -> Result<(LinkJob, Vec<Suggestion>)> {
        let job = self.jobs.fetch(job_id).await?;
        let suggestions = self.suggestions.list_for_job(job_id).await?;
        Ok((job, suggestions))
    }

    /// List jobs for a village, newest first.
    pub async fn list_jobs(
        &self,
        village_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LinkJob>> {
        self.villages.fetch(village_id).await?;
        self.jobs.list_for_village(village_id, limit, offset).await
    }

    pub(crate) fn jobs_repo(&self) -> Arc<dyn LinkJobRepository> {
        self.jobs.clone()
    }
}
