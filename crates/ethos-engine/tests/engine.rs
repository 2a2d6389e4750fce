//! Engine dispatch and persistence of batch results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use ethos_engine::{
    AgentInvoker, BenchItem, ConcurrencyLimiter, Depth, DepthSpecs, EngineRunner, JobKind,
    JobOutcome, JobRunner, JsonResultSink, ReasonReply, ReasonRequest, ReasoningBackend,
    RunParams, ScenarioItem, ScenarioPipelines, read_artifact,
};

/// Backend double whose every call panics, crashing the pipeline worker.
struct PanickingBackend;

#[async_trait]
impl ReasoningBackend for PanickingBackend {
    async fn reason(&self, _request: ReasonRequest) -> Result<ReasonReply> {
        panic!("backend blew up");
    }
}

fn pipelines() -> Arc<ScenarioPipelines> {
    let limiter = ConcurrencyLimiter::new(2);
    let invoker = Arc::new(AgentInvoker::new(
        Arc::new(PanickingBackend),
        limiter,
        Duration::from_secs(5),
    ));
    let mut personas = HashMap::new();
    personas.insert("Neutral".to_string(), serde_json::json!("balanced"));
    let mut frameworks = HashMap::new();
    frameworks.insert("Agentic".to_string(), serde_json::json!("act decisively"));
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

#[tokio::test]
async fn crashed_pipelines_are_persisted_as_error_placeholders() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = Arc::new(JsonResultSink::new(dir.path().join("results")));
    let scenarios = vec![ScenarioItem {
        id: "s1".to_string(),
        prompt: "a situation".to_string(),
        tags: Vec::new(),
        evaluation_criteria: None,
    }];
    let runner = EngineRunner::new(pipelines(), sink, scenarios, Vec::new());

    let outcome = runner
        .run(&JobKind::AllScenarios, &params())
        .await
        .expect("run succeeds");
    let JobOutcome::Saved(path) = outcome else {
        panic!("expected a saved artifact, got {outcome:?}");
    };

    let value = read_artifact(&path).await.expect("read back");
    let results = value["results"].as_array().expect("results list");
    assert_eq!(results.len(), 1, "every input item must appear in the artifact");
    assert_eq!(results[0]["item_id"], "s1");
    assert!(
        results[0]["error"]
            .as_str()
            .expect("error text")
            .starts_with("Task failed:"),
        "unexpected placeholder error: {}",
        results[0]["error"]
    );
}

#[tokio::test]
async fn crashed_benchmarks_count_as_errors_in_the_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sink = Arc::new(JsonResultSink::new(dir.path().join("results")));
    let benchmarks = vec![BenchItem {
        question_id: "q1".to_string(),
        prompt: "pick one".to_string(),
        answer: "B".to_string(),
    }];
    let runner = EngineRunner::new(pipelines(), sink, Vec::new(), benchmarks);

    let outcome = runner
        .run(&JobKind::AllBenchmarks, &params())
        .await
        .expect("run succeeds");
    let JobOutcome::Saved(path) = outcome else {
        panic!("expected a saved artifact, got {outcome:?}");
    };

    let value = read_artifact(&path).await.expect("read back");
    assert_eq!(value["results"].as_array().expect("results list").len(), 1);
    assert_eq!(value["results"][0]["item_id"], "q1");
    assert_eq!(value["metadata"]["summary"]["total"], 1);
    assert_eq!(value["metadata"]["summary"]["error"], 1);
    assert_eq!(value["metadata"]["summary"]["correct"], 0);
}
