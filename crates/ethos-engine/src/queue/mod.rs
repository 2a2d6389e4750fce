//! Sequential job queue: FIFO drain, per-job status state machine, asymmetric
//! pruning of terminal jobs.

mod manager;
mod types;

pub use manager::JobQueueManager;
pub use types::{
    DrainSummary, JobEvent, JobKind, JobOutcome, JobRunner, JobStatus, JobView, QueueError,
};
