//! Result persistence: structured run artifacts written as JSON files with
//! standardized names.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Depth, DepthSpec};
use crate::pipeline::{Judgement, PipelineReport};

/// Benchmark batch summary carried on run metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BenchSummary {
    /// Items in the batch.
    pub total: usize,
    /// Graded correct.
    pub correct: usize,
    /// Graded incorrect.
    pub incorrect: usize,
    /// Answer stage failed or timed out.
    pub error: usize,
}

impl BenchSummary {
    /// Tally judgements across a batch of reports.
    pub fn from_reports(reports: &[PipelineReport]) -> Self {
        let mut summary = Self {
            total: reports.len(),
            correct: 0,
            incorrect: 0,
            error: 0,
        };
        for report in reports {
            match report.judgement {
                Some(Judgement::Correct) => summary.correct += 1,
                Some(Judgement::Incorrect) => summary.incorrect += 1,
                Some(Judgement::Error) | None => summary.error += 1,
            }
        }
        summary
    }
}

/// Run parameters and provenance, saved alongside the results.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// Run type tag (e.g. `scenario_pipeline`, `benchmark_single`).
    pub run_type: String,
    /// UTC timestamp, `%Y%m%d_%H%M%S`.
    pub run_timestamp: String,
    /// Persona name.
    pub persona: String,
    /// Framework name.
    pub framework: String,
    /// Detail level.
    pub depth: Depth,
    /// Depth spec the run used.
    pub depth_spec: DepthSpec,
    /// Persona details from the loaded map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_details: Option<serde_json::Value>,
    /// Framework details from the loaded map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_details: Option<serde_json::Value>,
    /// Item id for single-item runs; used in the result file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Benchmark batch summary, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BenchSummary>,
}

/// One persisted run: metadata plus the ordered reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunArtifact {
    /// Run metadata.
    pub metadata: RunMetadata,
    /// Pipeline reports, in input item order.
    pub results: Vec<PipelineReport>,
}

/// Persistence seam. Every field produced by the pipelines and queue passes
/// through unmodified; the sink only chooses where and how to store it.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist one run artifact and return its location.
    async fn persist(&self, artifact: &RunArtifact) -> Result<PathBuf>;
}

/// Writes artifacts as pretty-printed JSON under a results directory.
pub struct JsonResultSink {
    results_dir: PathBuf,
}

impl JsonResultSink {
    /// Sink writing into `results_dir` (created on first persist).
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    fn file_name(metadata: &RunMetadata) -> String {
        let mut parts = vec![
            metadata.run_type.clone(),
            metadata.persona.to_lowercase(),
            metadata.framework.to_lowercase(),
            metadata.depth.to_string(),
        ];
        if let Some(ref item_id) = metadata.item_id {
            parts.push(item_id.to_lowercase());
        }
        parts.push(metadata.run_timestamp.clone());
        format!("{}.json", parts.join("_"))
    }
}

#[async_trait]
impl ResultSink for JsonResultSink {
    async fn persist(&self, artifact: &RunArtifact) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.results_dir)
            .await
            .with_context(|| {
                format!("creating results directory {}", self.results_dir.display())
            })?;
        let path = self.results_dir.join(Self::file_name(&artifact.metadata));
        let body = serde_json::to_vec_pretty(artifact).context("serializing run artifact")?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing results file {}", path.display()))?;
        tracing::info!("results saved to {}", path.display());
        Ok(path)
    }
}

/// Current UTC timestamp in the result-file format.
pub fn run_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Convenience used by tests and tooling: read an artifact back.
pub async fn read_artifact(path: &Path) -> Result<serde_json::Value> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading results file {}", path.display()))?;
    serde_json::from_str(&contents).context("parsing results file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepthSpecs;

    fn metadata(item_id: Option<String>) -> RunMetadata {
        RunMetadata {
            run_type: "benchmark".to_string(),
            run_timestamp: "20260828_120000".to_string(),
            persona: "Neutral".to_string(),
            framework: "Agentic".to_string(),
            depth: Depth::Low,
            depth_spec: DepthSpecs::default().get(Depth::Low).clone(),
            persona_details: None,
            framework_details: None,
            item_id,
            summary: None,
        }
    }

    #[test]
    fn file_names_are_standardized_and_lowercase() {
        assert_eq!(
            JsonResultSink::file_name(&metadata(None)),
            "benchmark_neutral_agentic_low_20260828_120000.json"
        );
        assert_eq!(
            JsonResultSink::file_name(&metadata(Some("Q7".to_string()))),
            "benchmark_neutral_agentic_low_q7_20260828_120000.json"
        );
    }

    #[tokio::test]
    async fn persist_writes_the_metadata_results_envelope() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = JsonResultSink::new(dir.path().join("results"));
        let artifact = RunArtifact {
            metadata: metadata(None),
            results: Vec::new(),
        };
        let path = sink.persist(&artifact).await.expect("persist succeeds");
        let value = read_artifact(&path).await.expect("read back");
        assert_eq!(value["metadata"]["run_type"], "benchmark");
        assert!(value["results"].as_array().expect("results list").is_empty());
    }
}
