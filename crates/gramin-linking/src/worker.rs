//! Scan worker: claims queued link jobs and drives them to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use gramin_core::{defaults, LinkJob, Result};

use crate::scan::ScanService;

/// Configuration for the scan worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent scan jobs.
    pub max_concurrent_jobs: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::WORKER_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable scan processing |
    /// | `WORKER_MAX_CONCURRENT_JOBS` | `4` | Max concurrent scans |
    /// | `WORKER_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("WORKER_MAX_CONCURRENT_JOBS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the scan worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A scan job was claimed and started.
    JobStarted { job_id: Uuid, village_id: Uuid },
    /// A scan job finished with the given suggestion count.
    JobFinished {
        job_id: Uuid,
        suggestion_count: i32,
    },
    /// A scan job was marked failed.
    JobFailed { job_id: Uuid },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| gramin_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Background worker that processes queued scan jobs.
///
/// The trigger call never blocks on execution; callers poll the job record
/// to observe completion. The worker is woken by the job repository's
/// notify handle when one is wired, with the poll interval as a safety net.
pub struct ScanWorker {
    scans: ScanService,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
    wake: Option<Arc<Notify>>,
}

impl ScanWorker {
    /// Create a new scan worker.
    pub fn new(scans: ScanService, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            scans,
            config,
            event_tx,
            wake: None,
        }
    }

    /// Wire an event-driven wake handle (e.g. the Pg job repository's
    /// notify) so new jobs are picked up without waiting a poll interval.
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent job processing.
    ///
    /// Claims up to `max_concurrent_jobs` at a time and processes them
    /// concurrently. Only sleeps when the queue is empty.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "linking", component = "scan_worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Scan worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Scan worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent_jobs;

        loop {
            // Check for shutdown before claiming jobs
            if shutdown_rx.try_recv().is_ok() {
                info!("Scan worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let scans = self.scans.clone();
                        let event_tx = self.event_tx.clone();
                        tasks.spawn(async move {
                            execute_job(scans, event_tx, job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Queue empty — wait for a wake or the poll interval
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scan worker received shutdown signal");
                        break;
                    }
                    _ = self.wait_for_wake(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent scan batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Scan task panicked");
                    }
                }
                // No sleep — immediately try to claim more jobs
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Scan worker stopped");
    }

    async fn wait_for_wake(&self, poll_interval: Duration) {
        match &self.wake {
            Some(notify) => {
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = sleep(poll_interval) => {}
                }
            }
            None => sleep(poll_interval).await,
        }
    }

    /// Claim the next queued job without processing it.
    async fn claim_job(&self) -> Option<LinkJob> {
        match self.scans.jobs_repo().claim_next().await {
            Ok(Some(job)) => Some(job),
            Ok(None) => None,
            Err(e) => {
                error!(error = ?e, "Failed to claim scan job");
                None
            }
        }
    }
}

/// Execute a single claimed job with the per-job timeout guard.
async fn execute_job(
    scans: ScanService,
    event_tx: broadcast::Sender<WorkerEvent>,
    job: LinkJob,
) {
    let job_id = job.id;
    let village_id = job.village_id;

    info!(job_id = %job_id, village_id = %village_id, "Processing scan job");
    let _ = event_tx.send(WorkerEvent::JobStarted { job_id, village_id });

    let job_timeout = Duration::from_secs(defaults::SCAN_TIMEOUT_SECS);
    let outcome = match tokio::time::timeout(job_timeout, scans.execute(job)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                job_id = %job_id,
                "Scan exceeded timeout of {}s",
                defaults::SCAN_TIMEOUT_SECS
            );
            let message = format!("Scan exceeded timeout of {}s", defaults::SCAN_TIMEOUT_SECS);
            if let Err(e) = scans.jobs_repo().fail(job_id, &message).await {
                error!(error = ?e, job_id = %job_id, "Failed to mark timed-out job as failed");
            }
            None
        }
    };

    match outcome {
        Some(suggestion_count) => {
            let _ = event_tx.send(WorkerEvent::JobFinished {
                job_id,
                suggestion_count,
            });
        }
        None => {
            let _ = event_tx.send(WorkerEvent::JobFailed { job_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(
            config.poll_interval_ms,
            defaults::WORKER_POLL_INTERVAL_MS
        );
        assert_eq!(config.max_concurrent_jobs, 4);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(1000)
            .with_max_concurrent(8)
            .with_enabled(false);

        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_concurrent_jobs, 8);
        assert!(!config.enabled);
    }

    #[test]
    fn test_worker_config_chaining_order_independence() {
        let config1 = WorkerConfig::default()
            .with_enabled(false)
            .with_max_concurrent(10)
            .with_poll_interval(3000);

        let config2 = WorkerConfig::default()
            .with_poll_interval(3000)
            .with_enabled(false)
            .with_max_concurrent(10);

        assert_eq!(config1.poll_interval_ms, config2.poll_interval_ms);
        assert_eq!(config1.max_concurrent_jobs, config2.max_concurrent_jobs);
        assert_eq!(config1.enabled, config2.enabled);
    }

    #[test]
    fn test_worker_event_job_finished() {
        let job_id = Uuid::new_v4();
        let event = WorkerEvent::JobFinished {
            job_id,
            suggestion_count: 3,
        };

        match event {
            WorkerEvent::JobFinished {
                job_id: id,
                suggestion_count,
            } => {
                assert_eq!(id, job_id);
                assert_eq!(suggestion_count, 3);
            }
            _ => panic!("Wrong event variant"),
        }
    }

    #[test]
    fn test_worker_event_clone_and_debug() {
        let event = WorkerEvent::WorkerStarted;
        let cloned = event.clone();
        assert!(matches!(cloned, WorkerEvent::WorkerStarted));

        let debug_str = format!("{:?}", WorkerEvent::WorkerStopped);
        assert!(debug_str.contains("WorkerStopped"));
    }
}
