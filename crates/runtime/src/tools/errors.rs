use thiserror::Error;

/// Errors that can occur while dispatching a single tool call.
///
/// These never reach the caller of the orchestrator. Each one is logged and
/// turned into a textual tool output so the conversation can continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("undecodable arguments: {0}")]
    ArgumentDecode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("tool panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
