//! Pipeline execution over the invoker: sequential stages per item, concurrent
//! items per batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::backend::{AgentInvoker, ReasonRequest, StageOutcome};
use crate::config::{Depth, DepthSpecs};
use crate::data::{BenchItem, ScenarioItem};
use crate::error::EngineError;
use crate::pipeline::types::{
    ANSWER_ROLE, EXECUTOR_ROLE, JUDGE_ROLE, Judgement, PLANNER_ROLE, PipelineReport, RunParams,
    StageName, StageReport,
};

/// Runs scenario and benchmark pipelines against the backend invoker.
///
/// Stage ordering within one pipeline is strictly sequential; fan-out across
/// items is unbounded here — the shared limiter inside the invoker is the
/// only throttle on actual backend calls.
pub struct ScenarioPipelines {
    invoker: Arc<AgentInvoker>,
    personas: HashMap<String, serde_json::Value>,
    frameworks: HashMap<String, serde_json::Value>,
    depth_specs: DepthSpecs,
}

impl ScenarioPipelines {
    /// Build a pipeline runner over loaded persona/framework maps.
    pub fn new(
        invoker: Arc<AgentInvoker>,
        personas: HashMap<String, serde_json::Value>,
        frameworks: HashMap<String, serde_json::Value>,
        depth_specs: DepthSpecs,
    ) -> Self {
        Self {
            invoker,
            personas,
            frameworks,
            depth_specs,
        }
    }

    /// Details for a persona, for run metadata.
    pub fn persona_details(&self, name: &str) -> Option<&serde_json::Value> {
        self.personas.get(name)
    }

    /// Details for a framework, for run metadata.
    pub fn framework_details(&self, name: &str) -> Option<&serde_json::Value> {
        self.frameworks.get(name)
    }

    /// Depth specs the pipelines run under.
    pub fn depth_specs(&self) -> &DepthSpecs {
        &self.depth_specs
    }

    /// Run the planner -> executor (-> judge) pipeline for one scenario.
    pub async fn run_scenario(&self, item: &ScenarioItem, params: &RunParams) -> PipelineReport {
        let pipeline_start = Instant::now();
        tracing::info!("pipeline {}: started", item.id);

        let stage_start = Instant::now();
        let planner = self
            .run_stage(
                format!("{}_planner", item.id),
                &params.persona,
                &params.framework,
                params.depth,
                format!("{PLANNER_ROLE} {}", item.prompt),
            )
            .await;
        let mut stages = vec![StageReport::from_outcome(
            StageName::Planner,
            &planner,
            stage_start.elapsed(),
        )];
        // The planner's tree is the only side artifact retained on the report.
        let decision_tree = match &planner {
            StageOutcome::Completed { decision_tree, .. } => decision_tree.clone(),
            _ => None,
        };

        let stage_start = Instant::now();
        let executor = if planner.is_failure() {
            tracing::warn!("pipeline {}: skipping executor due to planner failure", item.id);
            StageOutcome::Skipped
        } else {
            self.run_stage(
                format!("{}_executor", item.id),
                &params.persona,
                &params.framework,
                params.depth,
                format!("{EXECUTOR_ROLE} {}", planner.render()),
            )
            .await
        };
        stages.push(StageReport::from_outcome(
            StageName::Executor,
            &executor,
            stage_start.elapsed(),
        ));

        if let Some(judge) = &params.judge {
            let stage_start = Instant::now();
            let outcome = if matches!(executor, StageOutcome::Skipped) {
                tracing::warn!("pipeline {}: skipping judge, executor never ran", item.id);
                StageOutcome::Skipped
            } else {
                // The judge always runs against the executor's recorded output,
                // success or not, under its own parameter set.
                self.run_stage(
                    format!("{}_judge", item.id),
                    &judge.persona,
                    &judge.framework,
                    params.depth,
                    format!("{JUDGE_ROLE} {}", executor.render()),
                )
                .await
            };
            stages.push(StageReport::from_outcome(
                StageName::Judge,
                &outcome,
                stage_start.elapsed(),
            ));
        }

        let total = pipeline_start.elapsed();
        tracing::info!("pipeline {}: finished in {}ms", item.id, total.as_millis());
        PipelineReport {
            item_id: item.id.clone(),
            item_text: item.prompt.clone(),
            tags: item.tags.clone(),
            evaluation_criteria: item.evaluation_criteria.clone(),
            stages,
            judgement: None,
            decision_tree,
            total_elapsed_ms: total.as_millis() as u64,
            error: None,
        }
    }

    /// Run the single answer stage for one benchmark item and grade it.
    pub async fn run_benchmark(&self, item: &BenchItem, params: &RunParams) -> PipelineReport {
        let start = Instant::now();
        let outcome = self
            .run_stage(
                format!("bench_{}", item.question_id),
                &params.persona,
                &params.framework,
                params.depth,
                format!("{ANSWER_ROLE}\n\nQuestion:\n{}", item.prompt),
            )
            .await;
        let elapsed = start.elapsed();
        let judgement = grade(&outcome, &item.answer);
        tracing::info!(
            "benchmark {}: {:?} in {}ms",
            item.question_id,
            judgement,
            elapsed.as_millis()
        );
        let decision_tree = match &outcome {
            StageOutcome::Completed { decision_tree, .. } => decision_tree.clone(),
            _ => None,
        };
        PipelineReport {
            item_id: item.question_id.clone(),
            item_text: item.prompt.clone(),
            tags: Vec::new(),
            evaluation_criteria: Some(serde_json::json!({ "expected_answer": item.answer })),
            stages: vec![StageReport::from_outcome(StageName::Answer, &outcome, elapsed)],
            judgement: Some(judgement),
            decision_tree,
            total_elapsed_ms: elapsed.as_millis() as u64,
            error: None,
        }
    }

    /// Fan out one pipeline per scenario; the aggregated reports preserve
    /// input order regardless of completion order, and one pipeline's crash
    /// never aborts its siblings.
    pub async fn run_all_scenarios(
        self: &Arc<Self>,
        items: &[ScenarioItem],
        params: &RunParams,
    ) -> Vec<PipelineReport> {
        let mut workers = JoinSet::new();
        for (index, item) in items.iter().cloned().enumerate() {
            let runner = Arc::clone(self);
            let params = params.clone();
            workers.spawn(async move { (index, runner.run_scenario(&item, &params).await) });
        }
        let slots = gather_in_order(workers, items.len()).await;
        items
            .iter()
            .zip(slots)
            .map(|(item, slot)| {
                slot.unwrap_or_else(|| {
                    PipelineReport::failed(
                        &item.id,
                        &item.prompt,
                        "Task failed: pipeline worker crashed".to_string(),
                    )
                })
            })
            .collect()
    }

    /// Fan out one answer stage per benchmark item, same aggregation rules as
    /// [`Self::run_all_scenarios`].
    pub async fn run_all_benchmarks(
        self: &Arc<Self>,
        items: &[BenchItem],
        params: &RunParams,
    ) -> Vec<PipelineReport> {
        let mut workers = JoinSet::new();
        for (index, item) in items.iter().cloned().enumerate() {
            let runner = Arc::clone(self);
            let params = params.clone();
            workers.spawn(async move { (index, runner.run_benchmark(&item, &params).await) });
        }
        let slots = gather_in_order(workers, items.len()).await;
        items
            .iter()
            .zip(slots)
            .map(|(item, slot)| {
                slot.unwrap_or_else(|| {
                    PipelineReport::failed(
                        &item.question_id,
                        &item.prompt,
                        "Task failed: pipeline worker crashed".to_string(),
                    )
                })
            })
            .collect()
    }

    async fn run_stage(
        &self,
        call_id: String,
        persona: &str,
        framework: &str,
        depth: Depth,
        prompt: String,
    ) -> StageOutcome {
        let request = match self.reason_request(persona, framework, depth, prompt) {
            Ok(request) => request,
            Err(error) => {
                tracing::error!("call {call_id}: {error}");
                return StageOutcome::Failed {
                    reason: error.to_string(),
                };
            }
        };
        self.invoker.invoke(&call_id, request).await
    }

    fn reason_request(
        &self,
        persona: &str,
        framework: &str,
        depth: Depth,
        prompt: String,
    ) -> Result<ReasonRequest, EngineError> {
        let traits = self
            .personas
            .get(persona)
            .ok_or_else(|| EngineError::UnknownPersona(persona.to_string()))?;
        let doctrine = self
            .frameworks
            .get(framework)
            .ok_or_else(|| EngineError::UnknownFramework(framework.to_string()))?;
        let spec = self.depth_specs.get(depth);
        let system = format!(
            "You reason strictly according to the {framework} framework: {}. \
             Consider these persona traits in your analysis: {}. \
             Reason to at most {} levels of depth.",
            detail_text(doctrine),
            detail_text(traits),
            spec.max_depth
        );
        Ok(ReasonRequest {
            system,
            prompt,
            temperature: spec.temperature,
            max_tokens: spec.max_tokens,
        })
    }
}

/// Collect `(index, report)` pairs back into input order. A crashed worker
/// leaves its slot empty; the caller fills in a placeholder.
async fn gather_in_order(
    mut workers: JoinSet<(usize, PipelineReport)>,
    count: usize,
) -> Vec<Option<PipelineReport>> {
    let mut slots: Vec<Option<PipelineReport>> = vec![None; count];
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, report)) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(report);
                }
            }
            Err(error) => tracing::error!("pipeline worker crashed: {error}"),
        }
    }
    slots
}

/// Render persona/framework details for the system prompt.
fn detail_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn grade(outcome: &StageOutcome, expected: &str) -> Judgement {
    let StageOutcome::Completed { text, .. } = outcome else {
        return Judgement::Error;
    };
    let cleaned = text.trim().to_uppercase();
    let expected = expected.trim().to_uppercase();
    let single_letter = cleaned.len() == 1 && cleaned.chars().all(|c| c.is_ascii_uppercase());
    if single_letter && cleaned == expected {
        Judgement::Correct
    } else {
        Judgement::Incorrect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(text: &str) -> StageOutcome {
        StageOutcome::Completed {
            text: text.to_string(),
            decision_tree: None,
        }
    }

    #[test]
    fn grading_requires_a_single_matching_letter() {
        assert_eq!(grade(&completed("B"), "B"), Judgement::Correct);
        assert_eq!(grade(&completed(" b "), "B"), Judgement::Correct);
        assert_eq!(grade(&completed("A"), "B"), Judgement::Incorrect);
        assert_eq!(grade(&completed("BB"), "BB"), Judgement::Incorrect);
        assert_eq!(
            grade(
                &StageOutcome::Failed {
                    reason: "boom".to_string()
                },
                "B"
            ),
            Judgement::Error
        );
    }
}
