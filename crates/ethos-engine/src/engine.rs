//! Job dispatch glue: routes queued jobs to the right pipeline flow and
//! persists the aggregated reports.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::data::{BenchItem, ScenarioItem};
use crate::pipeline::{RunParams, ScenarioPipelines};
use crate::queue::{JobKind, JobOutcome, JobRunner};
use crate::sink::{BenchSummary, ResultSink, RunArtifact, RunMetadata, run_timestamp};

/// Production [`JobRunner`]: owns the loaded collections, the pipeline
/// runner, and the result sink.
pub struct EngineRunner {
    pipelines: Arc<ScenarioPipelines>,
    sink: Arc<dyn ResultSink>,
    scenarios: Vec<ScenarioItem>,
    benchmarks: Vec<BenchItem>,
}

impl EngineRunner {
    /// Build a runner over pre-loaded collections.
    pub fn new(
        pipelines: Arc<ScenarioPipelines>,
        sink: Arc<dyn ResultSink>,
        scenarios: Vec<ScenarioItem>,
        benchmarks: Vec<BenchItem>,
    ) -> Self {
        Self {
            pipelines,
            sink,
            scenarios,
            benchmarks,
        }
    }

    fn metadata(
        &self,
        run_type: &str,
        params: &RunParams,
        item_id: Option<String>,
        summary: Option<BenchSummary>,
    ) -> RunMetadata {
        RunMetadata {
            run_type: run_type.to_string(),
            run_timestamp: run_timestamp(),
            persona: params.persona.clone(),
            framework: params.framework.clone(),
            depth: params.depth,
            depth_spec: self.depth_spec_for(params),
            persona_details: self.pipelines.persona_details(&params.persona).cloned(),
            framework_details: self.pipelines.framework_details(&params.framework).cloned(),
            item_id,
            summary,
        }
    }

    fn depth_spec_for(&self, params: &RunParams) -> crate::config::DepthSpec {
        self.pipelines.depth_specs().get(params.depth).clone()
    }
}

#[async_trait]
impl JobRunner for EngineRunner {
    async fn run(&self, kind: &JobKind, params: &RunParams) -> Result<JobOutcome> {
        let (run_type, reports, item_id, summary) = match kind {
            JobKind::SingleScenario(item) => {
                let report = self.pipelines.run_scenario(item, params).await;
                (
                    "scenario_pipeline_single",
                    vec![report],
                    Some(item.id.clone()),
                    None,
                )
            }
            JobKind::SingleBenchmark(item) => {
                let report = self.pipelines.run_benchmark(item, params).await;
                let summary = BenchSummary::from_reports(std::slice::from_ref(&report));
                (
                    "benchmark_single",
                    vec![report],
                    Some(item.question_id.clone()),
                    Some(summary),
                )
            }
            JobKind::AllScenarios => {
                if self.scenarios.is_empty() {
                    bail!("no scenarios loaded");
                }
                let reports = self
                    .pipelines
                    .run_all_scenarios(&self.scenarios, params)
                    .await;
                ("scenario_pipeline", reports, None, None)
            }
            JobKind::AllBenchmarks => {
                if self.benchmarks.is_empty() {
                    bail!("no benchmark items loaded");
                }
                let reports = self
                    .pipelines
                    .run_all_benchmarks(&self.benchmarks, params)
                    .await;
                let summary = BenchSummary::from_reports(&reports);
                ("benchmark", reports, None, Some(summary))
            }
        };

        // Crashed-pipeline placeholders are persisted alongside normal
        // reports, so the saved artifact accounts for every input item.
        for report in &reports {
            if let Some(ref error) = report.error {
                tracing::error!("pipeline {} crashed: {error}", report.item_id);
            }
        }

        let artifact = RunArtifact {
            metadata: self.metadata(run_type, params, item_id, summary),
            results: reports,
        };
        match self.sink.persist(&artifact).await {
            Ok(path) => Ok(JobOutcome::Saved(path)),
            Err(error) => Ok(JobOutcome::SaveFailed(format!("{error:#}"))),
        }
    }
}
