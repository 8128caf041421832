//! Reasoning backend protocol types and client trait.

pub mod errors;
pub mod types;

pub use errors::BackendError;
pub use types::{
    ArtifactId, ReasoningClient, RunResult, RunStatus, SessionHandle, SessionRequest,
    ToolCallRequest, ToolCallResult, Usage,
};
