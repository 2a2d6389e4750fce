//! Settings loader: `settings.json` with defaults, clamping, and `env:` key resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default chat-completions endpoint.
pub const DEFAULT_INFERENCE_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Default model name.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default maximum concurrent backend calls.
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Default per-call timeout in seconds.
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 300;

/// Reasoning detail level for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// Shallow, cheap reasoning.
    Low,
    /// Balanced reasoning.
    Medium,
    /// Deep, expensive reasoning.
    High,
}

impl Depth {
    /// Lowercase label used in file names and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling/depth parameters for one detail level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSpec {
    /// Human-readable description, carried into run metadata.
    pub description: String,
    /// Maximum reasoning depth hint for the backend.
    pub max_depth: u32,
    /// Response token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Per-level depth specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSpecs {
    /// Spec for [`Depth::Low`].
    pub low: DepthSpec,
    /// Spec for [`Depth::Medium`].
    pub medium: DepthSpec,
    /// Spec for [`Depth::High`].
    pub high: DepthSpec,
}

impl DepthSpecs {
    /// Spec for the given level.
    pub fn get(&self, depth: Depth) -> &DepthSpec {
        match depth {
            Depth::Low => &self.low,
            Depth::Medium => &self.medium,
            Depth::High => &self.high,
        }
    }
}

impl Default for DepthSpecs {
    fn default() -> Self {
        Self {
            low: DepthSpec {
                description: "Low detail reasoning configuration".to_string(),
                max_depth: 1,
                max_tokens: 50,
                temperature: 0.3,
            },
            medium: DepthSpec {
                description: "Medium detail reasoning configuration".to_string(),
                max_depth: 2,
                max_tokens: 100,
                temperature: 0.5,
            },
            high: DepthSpec {
                description: "High detail reasoning configuration".to_string(),
                max_depth: 3,
                max_tokens: 150,
                temperature: 0.7,
            },
        }
    }
}

/// Backend endpoint settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Chat-completions URL.
    pub inference_url: String,
    /// Model name.
    pub model: String,
    /// Resolved API key, if configured and present.
    pub api_key: Option<String>,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend endpoint settings.
    pub backend: BackendSettings,
    /// Maximum concurrent backend calls (limiter capacity).
    pub concurrency: usize,
    /// Per-call timeout in seconds.
    pub agent_timeout_secs: u64,
    /// Per-level depth specs.
    pub depth_specs: DepthSpecs,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendSettings {
                inference_url: DEFAULT_INFERENCE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
                api_key: resolve_api_key(Some("env:OPENAI_API_KEY")),
            },
            concurrency: DEFAULT_CONCURRENCY,
            agent_timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
            depth_specs: DepthSpecs::default(),
        }
    }
}

/// On-disk settings shape. Every field is optional; absent fields fall back
/// to defaults.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    inference_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    concurrency: Option<usize>,
    agent_timeout_secs: Option<u64>,
    depth_specs: Option<DepthSpecs>,
}

/// Load settings from `path`, falling back to defaults when the file is
/// missing or invalid. Numeric values are clamped to sane minimums.
pub fn load_settings(path: &Path) -> Settings {
    let raw = match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<RawSettings>(&contents) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::error!(
                    "invalid settings file {}: {error}; using defaults",
                    path.display()
                );
                RawSettings::default()
            }
        },
        Err(error) => {
            tracing::warn!(
                "settings file {} not readable ({error}); using defaults",
                path.display()
            );
            RawSettings::default()
        }
    };

    let defaults = Settings::default();
    let api_key = match raw.api_key {
        Some(ref configured) => resolve_api_key(Some(configured)),
        None => defaults.backend.api_key,
    };

    let settings = Settings {
        backend: BackendSettings {
            inference_url: raw
                .inference_url
                .unwrap_or_else(|| DEFAULT_INFERENCE_URL.to_string()),
            model: raw.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
        },
        concurrency: raw.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1),
        agent_timeout_secs: raw
            .agent_timeout_secs
            .unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS)
            .max(1),
        depth_specs: raw.depth_specs.unwrap_or_default(),
    };
    tracing::info!(
        "settings loaded: concurrency={}, agent_timeout={}s, model={}",
        settings.concurrency,
        settings.agent_timeout_secs,
        settings.backend.model
    );
    settings
}

/// Resolve an API key setting. `"env:VAR"` reads the named environment
/// variable; a missing variable resolves to `None` with a warning.
fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    let configured = configured?;
    if let Some(var) = configured.strip_prefix("env:") {
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Some(key),
            _ => {
                tracing::warn!("environment variable {var} not set; API key missing");
                None
            }
        }
    } else {
        Some(configured.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings(Path::new("/nonexistent/settings.json"));
        assert_eq!(settings.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(settings.agent_timeout_secs, DEFAULT_AGENT_TIMEOUT_SECS);
        assert_eq!(settings.backend.model, DEFAULT_MODEL);
    }

    #[test]
    fn invalid_values_are_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"concurrency": 0, "agent_timeout_secs": 0}"#)
            .expect("write settings");
        let settings = load_settings(&path);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.agent_timeout_secs, 1);
    }

    #[test]
    fn literal_api_key_passes_through() {
        assert_eq!(
            resolve_api_key(Some("sk-test")),
            Some("sk-test".to_string())
        );
        assert_eq!(resolve_api_key(None), None);
    }

    #[test]
    fn depth_spec_lookup_matches_level() {
        let specs = DepthSpecs::default();
        assert_eq!(specs.get(Depth::Low).max_depth, 1);
        assert_eq!(specs.get(Depth::High).max_tokens, 150);
    }
}
