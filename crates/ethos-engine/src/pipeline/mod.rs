//! Multi-stage reasoning pipelines: planner -> executor (-> judge), plus the
//! single-stage benchmark flow, fanned out concurrently under the shared limiter.

mod runner;
mod types;

pub use runner::ScenarioPipelines;
pub use types::{
    ANSWER_ROLE, EXECUTOR_ROLE, JUDGE_ROLE, Judgement, JudgeParams, PLANNER_ROLE, PipelineReport,
    RunParams, StageName, StageReport,
};
