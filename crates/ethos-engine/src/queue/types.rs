//! Shared types for the job queue.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::data::{BenchItem, ScenarioItem};
use crate::pipeline::RunParams;

/// Job status state machine: `Pending -> Running -> {Completed, Error, Warning}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    /// Enqueued, not yet dispatched.
    Pending,
    /// Currently dispatched to an executor.
    Running,
    /// Pipeline finished and its result was persisted.
    Completed,
    /// Pipeline or dispatch failed; the computation must be redone.
    Error,
    /// Pipeline finished but persisting its result failed; only the save
    /// needs to be retried.
    Warning,
}

impl JobStatus {
    /// Terminal states never transition again (they are only removed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Warning)
    }

    /// Whether a transition to `next` is legal. Transitions are monotone;
    /// `Pending -> Error` covers dispatch rejection before a job ever starts.
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Error)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
                | (Self::Running, Self::Warning)
        )
    }
}

/// What a job runs: one item, or everything in a collection.
#[derive(Debug, Clone)]
pub enum JobKind {
    /// One scenario pipeline.
    SingleScenario(ScenarioItem),
    /// One benchmark item.
    SingleBenchmark(BenchItem),
    /// Fan out pipelines for every loaded scenario.
    AllScenarios,
    /// Fan out answer stages for every loaded benchmark item.
    AllBenchmarks,
}

impl JobKind {
    /// Short label for status views and logs.
    pub fn label(&self) -> String {
        match self {
            Self::SingleScenario(item) => format!("scenario {}", item.id),
            Self::SingleBenchmark(item) => format!("benchmark {}", item.question_id),
            Self::AllScenarios => "all scenarios".to_string(),
            Self::AllBenchmarks => "all benchmarks".to_string(),
        }
    }
}

/// Outcome of one job's executor, as seen by the queue.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The run finished and its result file was written.
    Saved(PathBuf),
    /// The run finished but the result could not be persisted.
    SaveFailed(String),
}

/// Executor abstraction so the queue can dispatch jobs to the engine or to
/// test doubles.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run one job to completion. `Err` means the run itself failed; a save
    /// failure after a successful run is [`JobOutcome::SaveFailed`].
    async fn run(&self, kind: &JobKind, params: &RunParams) -> Result<JobOutcome>;
}

/// Status snapshot of one job, for polling UIs.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    /// Unique job id.
    pub id: String,
    /// Job kind label.
    pub kind: String,
    /// Current status.
    pub status: JobStatus,
    /// Latest status detail (error text, saved file, ...).
    pub message: Option<String>,
}

/// Status-change event pushed to the presentation layer.
#[derive(Debug, Clone)]
pub struct JobEvent {
    /// Job id.
    pub job_id: String,
    /// New status.
    pub status: JobStatus,
    /// Status detail, if any.
    pub message: Option<String>,
}

/// Counters from one full drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Jobs dispatched this pass.
    pub dispatched: usize,
    /// Jobs that reached `Completed`.
    pub completed: usize,
    /// Jobs that reached `Error`.
    pub errored: usize,
    /// Jobs that reached `Warning`.
    pub warned: usize,
    /// Terminal jobs pruned after the pass.
    pub pruned: usize,
}

/// Queue operation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// A drain pass is already running.
    #[error("queue drain already in progress")]
    DrainInProgress,
    /// Nothing to drain.
    #[error("queue is empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub(super) struct JobRecord {
    pub(super) id: String,
    pub(super) kind: JobKind,
    pub(super) params: RunParams,
    pub(super) status: JobStatus,
    pub(super) message: Option<String>,
    pub(super) result_path: Option<PathBuf>,
}
