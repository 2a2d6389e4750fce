//! Data-file loading: scenario and benchmark collections, persona and framework maps.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One scenario item (collection A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioItem {
    /// Unique item id.
    pub id: String,
    /// Situation text handed to the planner stage.
    pub prompt: String,
    /// Free-form tags, carried through to the report.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque evaluation criteria, carried through to the report.
    #[serde(default)]
    pub evaluation_criteria: Option<serde_json::Value>,
}

/// One benchmark item (collection B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchItem {
    /// Unique question id.
    pub question_id: String,
    /// Question text, including answer options.
    pub prompt: String,
    /// Expected answer (a single capital letter).
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct BenchFile {
    eval_data: Vec<BenchItem>,
}

/// Load scenario items from a JSON list. Entries missing `id` or `prompt`
/// are skipped with a warning rather than failing the whole file.
pub fn load_scenarios(path: &Path) -> Result<Vec<ScenarioItem>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenarios file {}", path.display()))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("scenarios file {} is not a JSON list", path.display()))?;

    let mut scenarios = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ScenarioItem>(entry) {
            Ok(item) => scenarios.push(item),
            Err(error) => {
                tracing::warn!(
                    "skipping invalid scenario at index {index} in {}: {error}",
                    path.display()
                );
            }
        }
    }
    tracing::info!("loaded {} scenarios from {}", scenarios.len(), path.display());
    Ok(scenarios)
}

/// Load benchmark items from the `eval_data` envelope.
pub fn load_benchmarks(path: &Path) -> Result<Vec<BenchItem>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading benchmark file {}", path.display()))?;
    let file: BenchFile = serde_json::from_str(&contents)
        .with_context(|| format!("benchmark file {} missing 'eval_data' list", path.display()))?;
    tracing::info!(
        "loaded {} benchmark items from {}",
        file.eval_data.len(),
        path.display()
    );
    Ok(file.eval_data)
}

/// Load a name -> details map (personas or frameworks).
pub fn load_trait_map(path: &Path) -> Result<HashMap<String, serde_json::Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let map: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON object", path.display()))?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn invalid_scenario_entries_are_skipped() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"id": "s1", "prompt": "p1"}}, {{"prompt": "no id"}}, {{"id": "s2", "prompt": "p2", "tags": ["x"]}}]"#
        )
        .expect("write scenarios");
        let scenarios = load_scenarios(file.path()).expect("load should succeed");
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].id, "s1");
        assert_eq!(scenarios[1].tags, vec!["x".to_string()]);
    }

    #[test]
    fn benchmarks_require_eval_data_envelope() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"eval_data": [{{"question_id": "q1", "prompt": "pick", "answer": "B"}}]}}"#)
            .expect("write benchmarks");
        let items = load_benchmarks(file.path()).expect("load should succeed");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].answer, "B");

        let mut bad = tempfile::NamedTempFile::new().expect("temp file");
        write!(bad, r#"{{"data": []}}"#).expect("write bad file");
        assert!(load_benchmarks(bad.path()).is_err());
    }
}
