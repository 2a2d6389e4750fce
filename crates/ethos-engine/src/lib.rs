//! Reasoning pipelines under a shared concurrency limiter, with a sequential
//! job queue.
//!
//! - A [`ConcurrencyLimiter`] caps concurrent backend calls system-wide and
//!   exposes live usage for dashboards.
//! - An [`AgentInvoker`] performs one backend call per stage under the
//!   limiter and a hard timeout, producing typed [`StageOutcome`]s.
//! - [`ScenarioPipelines`] runs planner -> executor (-> judge) per item and
//!   fans out many items concurrently, aggregating in input order.
//! - A [`JobQueueManager`] drains heterogeneous jobs strictly one at a time,
//!   tracks a per-job status state machine, and prunes terminal jobs after a
//!   full drain (keeping `Warning` visible).

mod backend;
mod config;
mod data;
mod engine;
mod error;
mod limiter;
mod llm;
mod monitor;
mod pipeline;
mod queue;
mod sink;

pub use backend::{
    AgentInvoker, ReasonReply, ReasonRequest, ReasoningBackend, SKIP_MESSAGE, StageOutcome,
    StageStatus,
};
pub use config::{
    BackendSettings, DEFAULT_AGENT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DEFAULT_INFERENCE_URL,
    DEFAULT_MODEL, Depth, DepthSpec, DepthSpecs, Settings, load_settings,
};
pub use data::{BenchItem, ScenarioItem, load_benchmarks, load_scenarios, load_trait_map};
pub use engine::EngineRunner;
pub use error::EngineError;
pub use limiter::{ConcurrencyLimiter, LimiterSnapshot, SlotGuard};
pub use llm::LlmBackend;
pub use monitor::spawn_limiter_monitor;
pub use pipeline::{
    ANSWER_ROLE, EXECUTOR_ROLE, JUDGE_ROLE, JudgeParams, Judgement, PLANNER_ROLE, PipelineReport,
    RunParams, ScenarioPipelines, StageName, StageReport,
};
pub use queue::{
    DrainSummary, JobEvent, JobKind, JobOutcome, JobQueueManager, JobRunner, JobStatus, JobView,
    QueueError,
};
pub use sink::{
    BenchSummary, JsonResultSink, ResultSink, RunArtifact, RunMetadata, read_artifact,
    run_timestamp,
};
