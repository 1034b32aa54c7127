//! Error taxonomy for invariant generation.

use thiserror::Error;

/// Error raised by an external engine (reachability or k-induction).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("engine failure: {0}")]
    Failure(String),

    #[error("solver failure: {0}")]
    Solver(String),

    /// The engine observed a shutdown request at one of its checkpoints.
    #[error("interrupted: {0}")]
    Interrupted(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Error surfaced to consumers of an invariant generator.
///
/// `Clone` because a finished generation task hands the same outcome to
/// every reader.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The engine failed; fatal for the generator instance.
    #[error("invariant generation failed: {0}")]
    Engine(String),

    #[error("invariant generation failed: solver failure: {0}")]
    Solver(String),

    /// A blocking query was interrupted by cancellation. Not a bug.
    #[error("invariant generation cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invariant generation task panicked: {0}")]
    TaskPanicked(String),
}

impl GenerationError {
    pub fn cancelled(reason: impl Into<String>) -> Self {
        GenerationError::Cancelled {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled { .. })
    }
}

impl From<EngineError> for GenerationError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Failure(message) => GenerationError::Engine(message),
            EngineError::Solver(message) => GenerationError::Solver(message),
            EngineError::Interrupted(reason) => GenerationError::Cancelled { reason },
        }
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;
