use crate::config::ConfigError;
use crate::model::BackendError;
use thiserror::Error;

/// Errors surfaced to the caller of the orchestrator.
///
/// Per-call tool failures are not here: they are reported to the backend as
/// tool output and never end a conversation.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Two tools were registered under the same name.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    /// The backend could not be reached or answered with garbage.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The backend reported the run as failed.
    #[error("run failed: {0}")]
    RunFailed(String),

    /// The final answer never satisfied the structured contract.
    #[error("structured output still invalid after {attempts} attempts; missing keys: {missing:?}")]
    StructuredValidation { attempts: u32, missing: Vec<String> },

    /// The backend kept requesting tool calls past the round cap.
    #[error("backend requested tool calls for more than {limit} rounds")]
    RoundLimitExceeded { limit: u32 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
