//! Shared types for pipeline execution and reports.

use std::time::Duration;

use serde::Serialize;

use crate::backend::{StageOutcome, StageStatus};
use crate::config::Depth;

/// Planner role preamble.
pub const PLANNER_ROLE: &str = "Create an executable, concise, 3 step plan for this situation:";
/// Executor role preamble.
pub const EXECUTOR_ROLE: &str = "Execute the following plan rapidly and effectively:";
/// Judge role preamble.
pub const JUDGE_ROLE: &str = "Judge the following plan and evaluate its ethical implications:";
/// Benchmark answer role preamble.
pub const ANSWER_ROLE: &str = "Carefully analyze the following question and options. Respond ONLY \
     with the single capital letter corresponding to the best answer.";

/// Named pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    /// First stage: produce a plan from the item text.
    Planner,
    /// Second stage: execute the plan.
    Executor,
    /// Optional third stage: evaluate the execution, with its own parameter set.
    Judge,
    /// Single benchmark stage.
    Answer,
}

impl StageName {
    /// Lowercase label used in call ids and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Judge => "judge",
            Self::Answer => "answer",
        }
    }
}

/// Parameter set the judge stage runs under, distinct from the main run.
#[derive(Debug, Clone)]
pub struct JudgeParams {
    /// Judge persona name.
    pub persona: String,
    /// Judge framework name.
    pub framework: String,
}

/// Execution parameters for one job.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Persona name (must exist in the loaded persona map).
    pub persona: String,
    /// Framework name (must exist in the loaded framework map).
    pub framework: String,
    /// Reasoning detail level.
    pub depth: Depth,
    /// When set, scenario pipelines append a judge stage under these parameters.
    pub judge: Option<JudgeParams>,
}

/// Benchmark grading verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Judgement {
    /// Answer matched the expected letter.
    Correct,
    /// Answer did not match.
    Incorrect,
    /// The answer stage failed or timed out.
    Error,
}

/// One recorded stage: status, rendered output text, and elapsed time.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    /// Stage name.
    pub name: StageName,
    /// Typed status of the invocation.
    pub status: StageStatus,
    /// Rendered output text (legacy string form at the report boundary).
    pub output: String,
    /// Stage wall-clock time in milliseconds, for observability only.
    pub elapsed_ms: u64,
}

impl StageReport {
    /// Record an outcome for a stage.
    pub fn from_outcome(name: StageName, outcome: &StageOutcome, elapsed: Duration) -> Self {
        Self {
            name,
            status: outcome.status(),
            output: outcome.render(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Structured result of one pipeline run for one item.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Item id.
    pub item_id: String,
    /// Original item text.
    pub item_text: String,
    /// Tags carried from the item.
    pub tags: Vec<String>,
    /// Evaluation criteria carried from the item (benchmarks: expected answer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_criteria: Option<serde_json::Value>,
    /// Ordered stage outputs.
    pub stages: Vec<StageReport>,
    /// Benchmark grading verdict, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgement: Option<Judgement>,
    /// Planner's reasoning-tree artifact (first stage only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_tree: Option<serde_json::Value>,
    /// Total pipeline wall-clock time in milliseconds.
    pub total_elapsed_ms: u64,
    /// Set when the pipeline task itself crashed instead of producing stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineReport {
    /// Placeholder report for a pipeline whose task failed outright.
    pub fn failed(item_id: &str, item_text: &str, reason: String) -> Self {
        Self {
            item_id: item_id.to_string(),
            item_text: item_text.to_string(),
            tags: Vec::new(),
            evaluation_criteria: None,
            stages: Vec::new(),
            judgement: None,
            decision_tree: None,
            total_elapsed_ms: 0,
            error: Some(reason),
        }
    }

    /// Rendered output of the named stage, if recorded.
    pub fn stage_output(&self, name: StageName) -> Option<&str> {
        self.stages
            .iter()
            .find(|stage| stage.name == name)
            .map(|stage| stage.output.as_str())
    }
}
