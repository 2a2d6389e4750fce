//! Queue manager: enqueue, sequential drain, status updates, pruning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, mpsc};

use crate::pipeline::RunParams;
use crate::queue::types::{
    DrainSummary, JobEvent, JobKind, JobOutcome, JobRecord, JobRunner, JobStatus, JobView,
    QueueError,
};

/// Holds the ordered job collection and drains it one job at a time.
///
/// The drain loop is strictly sequential: job N+1 is never dispatched before
/// job N's status is finalized, even though one job's executor may fan out
/// arbitrarily many concurrent pipelines internally.
pub struct JobQueueManager {
    runner: Arc<dyn JobRunner>,
    jobs: RwLock<Vec<JobRecord>>,
    draining: AtomicBool,
    events: mpsc::UnboundedSender<JobEvent>,
}

/// Clears the draining flag when a drain pass ends, including when its
/// future is dropped mid-pass.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl JobQueueManager {
    /// Create the manager and return it with the status-event receiver.
    pub fn new(runner: Arc<dyn JobRunner>) -> (Arc<Self>, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            runner,
            jobs: RwLock::new(Vec::new()),
            draining: AtomicBool::new(false),
            events,
        });
        (manager, events_rx)
    }

    /// Append a job to the back of the queue. Duplicate payloads are allowed.
    /// Returns the generated job id.
    pub async fn enqueue(&self, kind: JobKind, params: RunParams) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            kind,
            params,
            status: JobStatus::Pending,
            message: None,
            result_path: None,
        };
        tracing::info!("enqueued job {id} ({})", record.kind.label());
        self.jobs.write().await.push(record);
        id
    }

    /// Whether a drain pass is currently running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Snapshot of every visible job, in queue order.
    pub async fn jobs(&self) -> Vec<JobView> {
        self.jobs
            .read()
            .await
            .iter()
            .map(|record| JobView {
                id: record.id.clone(),
                kind: record.kind.label(),
                status: record.status,
                message: record.message.clone(),
            })
            .collect()
    }

    /// Result file recorded for a job, if it completed with one.
    pub async fn result_path(&self, job_id: &str) -> Option<std::path::PathBuf> {
        self.jobs
            .read()
            .await
            .iter()
            .find(|record| record.id == job_id)
            .and_then(|record| record.result_path.clone())
    }

    /// Empty the queue. Refused while a drain is running.
    pub async fn clear(&self) -> Result<(), QueueError> {
        if self.is_draining() {
            tracing::warn!("clear refused: drain in progress");
            return Err(QueueError::DrainInProgress);
        }
        let mut jobs = self.jobs.write().await;
        tracing::info!("queue cleared ({} jobs removed)", jobs.len());
        jobs.clear();
        Ok(())
    }

    /// Drain every non-terminal job in enqueue order, then prune.
    ///
    /// Jobs enqueued after the pass starts are left for the next drain. After
    /// the pass, `Completed` and `Error` jobs are removed from the visible
    /// queue while `Warning` jobs are retained for operator attention.
    pub async fn start_drain(self: &Arc<Self>) -> Result<DrainSummary, QueueError> {
        if self.draining.swap(true, Ordering::SeqCst) {
            tracing::warn!("start_drain refused: drain already in progress");
            return Err(QueueError::DrainInProgress);
        }
        let _guard = DrainGuard(&self.draining);

        // Snapshot of ids at drain start; late arrivals wait for the next pass.
        let snapshot: Vec<String> = self
            .jobs
            .read()
            .await
            .iter()
            .map(|record| record.id.clone())
            .collect();
        if snapshot.is_empty() {
            tracing::warn!("start_drain refused: queue is empty");
            return Err(QueueError::Empty);
        }

        tracing::info!("queue drain started ({} jobs)", snapshot.len());
        let mut summary = DrainSummary::default();
        for job_id in snapshot {
            let Some((kind, params, status)) = self.job_details(&job_id).await else {
                continue;
            };
            if status.is_terminal() {
                tracing::debug!("skipping job {job_id} with terminal status {status:?}");
                continue;
            }

            self.set_status(&job_id, JobStatus::Running, None, None).await;
            summary.dispatched += 1;

            // Spawned so a panicking executor is isolated to this job.
            let runner = Arc::clone(&self.runner);
            let worker =
                tokio::spawn(async move { runner.run(&kind, &params).await });
            match worker.await {
                Ok(Ok(JobOutcome::Saved(path))) => {
                    let file = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    self.set_status(
                        &job_id,
                        JobStatus::Completed,
                        Some(format!("Saved to {file}")),
                        Some(path),
                    )
                    .await;
                    summary.completed += 1;
                }
                Ok(Ok(JobOutcome::SaveFailed(reason))) => {
                    tracing::error!("job {job_id}: result persistence failed: {reason}");
                    self.set_status(
                        &job_id,
                        JobStatus::Warning,
                        Some("Run finished, but failed to save results.".to_string()),
                        None,
                    )
                    .await;
                    summary.warned += 1;
                }
                Ok(Err(error)) => {
                    tracing::error!("job {job_id}: runtime error: {error:#}");
                    self.set_status(
                        &job_id,
                        JobStatus::Error,
                        Some(format!("Runtime error: {error}")),
                        None,
                    )
                    .await;
                    summary.errored += 1;
                }
                Err(join_error) => {
                    tracing::error!("job {job_id}: worker crashed: {join_error}");
                    self.set_status(
                        &job_id,
                        JobStatus::Error,
                        Some(format!("Job worker crashed: {join_error}")),
                        None,
                    )
                    .await;
                    summary.errored += 1;
                }
            }
        }

        // Asymmetric pruning: drop Completed and Error, keep Warning visible.
        {
            let mut jobs = self.jobs.write().await;
            let before = jobs.len();
            jobs.retain(|record| {
                !matches!(record.status, JobStatus::Completed | JobStatus::Error)
            });
            summary.pruned = before - jobs.len();
        }

        tracing::info!(
            "queue drain finished: {} dispatched, {} completed, {} errored, {} warned, {} pruned",
            summary.dispatched,
            summary.completed,
            summary.errored,
            summary.warned,
            summary.pruned
        );
        Ok(summary)
    }

    async fn job_details(&self, job_id: &str) -> Option<(JobKind, RunParams, JobStatus)> {
        self.jobs
            .read()
            .await
            .iter()
            .find(|record| record.id == job_id)
            .map(|record| (record.kind.clone(), record.params.clone(), record.status))
    }

    /// Apply a status transition, rejecting illegal ones, and emit an event.
    async fn set_status(
        &self,
        job_id: &str,
        next: JobStatus,
        message: Option<String>,
        result_path: Option<std::path::PathBuf>,
    ) {
        let mut jobs = self.jobs.write().await;
        let Some(record) = jobs.iter_mut().find(|record| record.id == job_id) else {
            tracing::warn!("status update for unknown job {job_id}");
            return;
        };
        if !record.status.can_transition(next) {
            tracing::warn!(
                "rejected status transition {:?} -> {next:?} for job {job_id}",
                record.status
            );
            return;
        }
        record.status = next;
        if message.is_some() {
            record.message = message.clone();
        }
        if result_path.is_some() {
            record.result_path = result_path;
        }
        drop(jobs);

        tracing::info!("job {job_id} status -> {next:?}");
        let _ = self.events.send(JobEvent {
            job_id: job_id.to_string(),
            status: next,
            message,
        });
    }
}
