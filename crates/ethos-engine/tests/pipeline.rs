//! Pipeline stage sequencing and fan-out against a scripted backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use ethos_engine::{
    AgentInvoker, ConcurrencyLimiter, Depth, DepthSpecs, EXECUTOR_ROLE, JUDGE_ROLE, JudgeParams,
    PLANNER_ROLE, ReasonReply, ReasonRequest, ReasoningBackend, RunParams, SKIP_MESSAGE,
    ScenarioItem, ScenarioPipelines, StageName, StageStatus,
};

/// Backend double: succeeds by default, with switchable planner behavior, and
/// records every call it receives.
struct ScriptedBackend {
    fail_planner: bool,
    stall_planner: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_planner: false,
            stall_planner: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing_planner() -> Arc<Self> {
        Arc::new(Self {
            fail_planner: true,
            stall_planner: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn stalling_planner() -> Arc<Self> {
        Arc::new(Self {
            fail_planner: false,
            stall_planner: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonReply> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push((request.system.clone(), request.prompt.clone()));
        if request.prompt.starts_with(PLANNER_ROLE) {
            if self.stall_planner {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.fail_planner {
                return Err(anyhow!("backend unavailable"));
            }
            return Ok(ReasonReply {
                text: "the plan".to_string(),
                decision_tree: Some(serde_json::json!({"root": "assess"})),
            });
        }
        // Per-item delay so completion order differs from input order.
        if request.prompt.contains("slowest") {
            tokio::time::sleep(Duration::from_millis(60)).await;
        } else if request.prompt.contains("slower") {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        Ok(ReasonReply {
            text: format!("echo: {}", request.prompt),
            decision_tree: None,
        })
    }
}

fn pipelines(backend: Arc<ScriptedBackend>, timeout: Duration) -> Arc<ScenarioPipelines> {
    let limiter = ConcurrencyLimiter::new(8);
    let invoker = Arc::new(AgentInvoker::new(backend, limiter, timeout));
    let mut personas = HashMap::new();
    personas.insert("Neutral".to_string(), serde_json::json!("balanced"));
    personas.insert("Arbiter".to_string(), serde_json::json!("strict"));
    let mut frameworks = HashMap::new();
    frameworks.insert("Agentic".to_string(), serde_json::json!("act decisively"));
    frameworks.insert("Deontological".to_string(), serde_json::json!("follow rules"));
    Arc::new(ScenarioPipelines::new(
        invoker,
        personas,
        frameworks,
        DepthSpecs::default(),
    ))
}

fn params() -> RunParams {
    RunParams {
        persona: "Neutral".to_string(),
        framework: "Agentic".to_string(),
        depth: Depth::Low,
        judge: None,
    }
}

fn scenario(id: &str, prompt: &str) -> ScenarioItem {
    ScenarioItem {
        id: id.to_string(),
        prompt: prompt.to_string(),
        tags: Vec::new(),
        evaluation_criteria: None,
    }
}

#[tokio::test]
async fn executor_receives_the_planner_output() {
    let backend = ScriptedBackend::new();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_secs(5));

    let report = pipelines
        .run_scenario(&scenario("s1", "a situation"), &params())
        .await;

    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.stages[0].status, StageStatus::Ok);
    assert_eq!(report.stages[1].status, StageStatus::Ok);
    assert_eq!(report.decision_tree, Some(serde_json::json!({"root": "assess"})));

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1.starts_with(EXECUTOR_ROLE));
    assert!(calls[1].1.contains("the plan"), "executor did not see the plan");
}

#[tokio::test]
async fn planner_failure_skips_the_executor() {
    let backend = ScriptedBackend::failing_planner();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_secs(5));

    let report = pipelines
        .run_scenario(&scenario("s1", "a situation"), &params())
        .await;

    assert_eq!(report.stages[0].status, StageStatus::Error);
    assert!(
        report.stages[0]
            .output
            .starts_with("Error: Agent execution failed - "),
        "unexpected planner output: {}",
        report.stages[0].output
    );
    assert_eq!(report.stages[1].status, StageStatus::Skipped);
    assert_eq!(report.stage_output(StageName::Executor), Some(SKIP_MESSAGE));
    assert_eq!(backend.calls().len(), 1, "executor must never be invoked");
}

#[tokio::test]
async fn planner_timeout_is_recorded_and_skips_downstream() {
    let backend = ScriptedBackend::stalling_planner();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_millis(50));

    let report = pipelines
        .run_scenario(&scenario("s1", "a situation"), &params())
        .await;

    assert_eq!(report.stages[0].status, StageStatus::Timeout);
    assert!(
        report.stages[0]
            .output
            .starts_with("Error: Agent execution timed out after"),
        "unexpected planner output: {}",
        report.stages[0].output
    );
    assert_eq!(report.stages[1].status, StageStatus::Skipped);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn judge_runs_under_its_own_parameters() {
    let backend = ScriptedBackend::new();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_secs(5));
    let mut params = params();
    params.judge = Some(JudgeParams {
        persona: "Arbiter".to_string(),
        framework: "Deontological".to_string(),
    });

    let report = pipelines
        .run_scenario(&scenario("s1", "a situation"), &params)
        .await;

    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages[2].name, StageName::Judge);
    assert_eq!(report.stages[2].status, StageStatus::Ok);

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].1.starts_with(JUDGE_ROLE));
    // The judge's system context carries its own persona and framework.
    assert!(calls[2].0.contains("Deontological"));
    assert!(calls[2].0.contains("strict"));
}

#[tokio::test]
async fn judge_is_skipped_when_the_executor_never_ran() {
    let backend = ScriptedBackend::failing_planner();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_secs(5));
    let mut params = params();
    params.judge = Some(JudgeParams {
        persona: "Arbiter".to_string(),
        framework: "Deontological".to_string(),
    });

    let report = pipelines
        .run_scenario(&scenario("s1", "a situation"), &params)
        .await;

    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages[2].status, StageStatus::Skipped);
    assert_eq!(backend.calls().len(), 1, "only the planner may be invoked");
}

#[tokio::test]
async fn fan_out_preserves_input_order() {
    let backend = ScriptedBackend::new();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_secs(5));
    let items = vec![
        scenario("s1", "the slowest situation"),
        scenario("s2", "a slower situation"),
        scenario("s3", "a quick situation"),
    ];

    let reports = pipelines.run_all_scenarios(&items, &params()).await;

    let ids: Vec<&str> = reports.iter().map(|report| report.item_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s3"]);
    for report in &reports {
        assert!(report.error.is_none());
        assert_eq!(report.stages.len(), 2);
    }
}

#[tokio::test]
async fn unknown_persona_fails_the_stage_without_a_backend_call() {
    let backend = ScriptedBackend::new();
    let pipelines = pipelines(Arc::clone(&backend), Duration::from_secs(5));
    let mut params = params();
    params.persona = "Ghost".to_string();

    let report = pipelines
        .run_scenario(&scenario("s1", "a situation"), &params)
        .await;

    assert_eq!(report.stages[0].status, StageStatus::Error);
    assert!(report.stages[0].output.contains("unknown persona"));
    assert_eq!(report.stages[1].status, StageStatus::Skipped);
    assert!(backend.calls().is_empty(), "backend must never be reached");
}
