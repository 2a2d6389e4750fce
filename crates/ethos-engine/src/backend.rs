//! Backend invocation: one generative call under the limiter with a hard timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::limiter::ConcurrencyLimiter;

/// Fixed text recorded for a stage that was skipped after an upstream failure.
pub const SKIP_MESSAGE: &str = "Error: Skipped due to upstream failure.";

/// One generative request, fully assembled (system context, user prompt, sampling).
#[derive(Debug, Clone)]
pub struct ReasonRequest {
    /// System context (persona traits + framework description).
    pub system: String,
    /// User prompt (role preamble + item text).
    pub prompt: String,
    /// Sampling temperature from the depth spec.
    pub temperature: f32,
    /// Response token budget from the depth spec.
    pub max_tokens: u32,
}

/// Backend reply: the response text plus an optional reasoning-tree artifact.
#[derive(Debug, Clone)]
pub struct ReasonReply {
    /// Final response text.
    pub text: String,
    /// Opaque decision-tree artifact, when the backend produces one.
    pub decision_tree: Option<serde_json::Value>,
}

/// Async backend abstraction so pipelines can run against a real generative
/// service or test doubles.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Perform one generative call and return the reply.
    async fn reason(&self, request: ReasonRequest) -> Result<ReasonReply>;
}

/// Typed result of one stage invocation.
///
/// Timeouts and invocation errors are recorded outcomes, not hard failures:
/// they never abort sibling stages or sibling pipelines. The legacy
/// `"Error: ..."` text form exists only at the report boundary, via
/// [`StageOutcome::render`].
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// The call returned normally.
    Completed {
        /// Response text.
        text: String,
        /// Optional reasoning-tree artifact.
        decision_tree: Option<serde_json::Value>,
    },
    /// The call exceeded the wall-clock deadline.
    TimedOut {
        /// The deadline that was exceeded.
        limit: Duration,
    },
    /// The call raised an invocation error.
    Failed {
        /// Error detail, already logged in full by the invoker.
        reason: String,
    },
    /// The stage was never invoked because an upstream stage failed.
    Skipped,
}

/// Coarse stage status carried on serialized reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Completed normally.
    Ok,
    /// Deadline exceeded.
    Timeout,
    /// Invocation error.
    Error,
    /// Never invoked (upstream failure).
    Skipped,
}

impl StageOutcome {
    /// Whether this outcome short-circuits the next stage.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Completed { .. })
    }

    /// Status tag for reports.
    pub fn status(&self) -> StageStatus {
        match self {
            Self::Completed { .. } => StageStatus::Ok,
            Self::TimedOut { .. } => StageStatus::Timeout,
            Self::Failed { .. } => StageStatus::Error,
            Self::Skipped => StageStatus::Skipped,
        }
    }

    /// Text form recorded on reports. Matches the legacy string convention
    /// consumed by existing result files.
    pub fn render(&self) -> String {
        match self {
            Self::Completed { text, .. } => text.clone(),
            Self::TimedOut { limit } => {
                format!(
                    "Error: Agent execution timed out after {} seconds.",
                    limit.as_secs()
                )
            }
            Self::Failed { reason } => format!("Error: Agent execution failed - {reason}"),
            Self::Skipped => SKIP_MESSAGE.to_string(),
        }
    }
}

/// Performs exactly one backend call per invocation, under the shared limiter
/// and a hard wall-clock timeout.
pub struct AgentInvoker {
    backend: Arc<dyn ReasoningBackend>,
    limiter: Arc<ConcurrencyLimiter>,
    timeout: Duration,
}

impl AgentInvoker {
    /// Build an invoker over a backend, the shared limiter, and the per-call deadline.
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        limiter: Arc<ConcurrencyLimiter>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            limiter,
            timeout,
        }
    }

    /// Shared limiter instance, for observability surfaces.
    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    /// Run one call. The limiter slot is held for exactly the duration of the
    /// call and returned on every exit path; timeout and invocation errors
    /// come back as recorded outcomes, never as `Err`.
    pub async fn invoke(&self, call_id: &str, request: ReasonRequest) -> StageOutcome {
        let slot = match self.limiter.acquire().await {
            Ok(slot) => slot,
            Err(error) => {
                tracing::error!("call {call_id}: limiter unavailable: {error}");
                return StageOutcome::Failed {
                    reason: error.to_string(),
                };
            }
        };

        let outcome = match tokio::time::timeout(self.timeout, self.backend.reason(request)).await {
            Ok(Ok(reply)) => StageOutcome::Completed {
                text: reply.text.trim().to_string(),
                decision_tree: reply.decision_tree,
            },
            Ok(Err(error)) => {
                tracing::error!("call {call_id}: backend invocation failed: {error:#}");
                StageOutcome::Failed {
                    reason: error.to_string(),
                }
            }
            Err(_) => {
                tracing::error!(
                    "call {call_id}: backend call timed out after {:?}",
                    self.timeout
                );
                StageOutcome::TimedOut {
                    limit: self.timeout,
                }
            }
        };
        drop(slot);
        outcome
    }
}
