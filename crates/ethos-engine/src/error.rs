//! Error types for the engine core.

use thiserror::Error;

/// Engine-specific errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The concurrency limiter was closed (process shutdown).
    #[error("concurrency limiter closed")]
    LimiterClosed,

    /// Persona name not present in the loaded persona map.
    #[error("unknown persona: {0}")]
    UnknownPersona(String),

    /// Framework name not present in the loaded framework map.
    #[error("unknown framework: {0}")]
    UnknownFramework(String),
}
